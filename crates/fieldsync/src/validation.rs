//! 服务端校验结果
//!
//! 后端更新接口在返回实体的同时附带校验报告。是否视为拒绝由
//! [`ValidationPresenter`] 判定，控制器据此决定接受还是回滚。

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::error::Result;

/// 校验问题级别
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum IssueSeverity {
    #[default]
    Error,
    Warning,
}

/// 单条校验问题（字段级）
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ValidationIssue {
    /// 关联字段，None 表示记录级问题
    #[serde(default)]
    pub field: Option<String>,
    pub message: String,
    #[serde(default)]
    pub severity: IssueSeverity,
}

impl ValidationIssue {
    pub fn error(field: Option<&str>, message: impl Into<String>) -> Self {
        Self {
            field: field.map(String::from),
            message: message.into(),
            severity: IssueSeverity::Error,
        }
    }

    pub fn warning(field: Option<&str>, message: impl Into<String>) -> Self {
        Self {
            field: field.map(String::from),
            message: message.into(),
            severity: IssueSeverity::Warning,
        }
    }
}

/// 一次更新的校验报告
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ValidationReport {
    #[serde(default)]
    pub issues: Vec<ValidationIssue>,
}

impl ValidationReport {
    pub fn new(issues: Vec<ValidationIssue>) -> Self {
        Self { issues }
    }

    /// 无问题的报告
    pub fn clean() -> Self {
        Self::default()
    }

    /// 单条原因的拒绝报告
    pub fn rejected(reason: impl Into<String>) -> Self {
        Self::new(vec![ValidationIssue::error(None, reason)])
    }

    /// 解析后端返回的校验载荷
    ///
    /// 接受 `{"issues": [...]}`、裸数组，或 `{"reason": "..."}` 单原因形式。
    pub fn from_json(value: &serde_json::Value) -> Result<Self> {
        if let Some(reason) = value.get("reason").and_then(|r| r.as_str()) {
            return Ok(Self::rejected(reason));
        }
        if value.is_array() {
            let issues: Vec<ValidationIssue> = serde_json::from_value(value.clone())?;
            return Ok(Self::new(issues));
        }
        Ok(serde_json::from_value(value.clone())?)
    }

    pub fn is_empty(&self) -> bool {
        self.issues.is_empty()
    }

    pub fn has_errors(&self) -> bool {
        self.issues
            .iter()
            .any(|issue| issue.severity == IssueSeverity::Error)
    }

    /// 原样返回所有问题文本（按后端顺序）
    pub fn messages(&self) -> Vec<String> {
        self.issues.iter().map(|issue| issue.message.clone()).collect()
    }

    /// 指定字段的问题
    pub fn issues_for<'a>(&'a self, field: &'a str) -> impl Iterator<Item = &'a ValidationIssue> + 'a {
        self.issues
            .iter()
            .filter(move |issue| issue.field.as_deref() == Some(field))
    }
}

impl fmt::Display for ValidationReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.messages().join("; "))
    }
}

/// 更新接口的应答：后端返回的实体 + 校验报告
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UpdateReply<E> {
    pub entity: E,
    #[serde(default)]
    pub report: ValidationReport,
}

impl<E> UpdateReply<E> {
    pub fn accepted(entity: E) -> Self {
        Self {
            entity,
            report: ValidationReport::clean(),
        }
    }

    pub fn rejected(entity: E, report: ValidationReport) -> Self {
        Self { entity, report }
    }
}

/// 校验结论
#[derive(Debug, Clone)]
pub enum ValidationOutcome<E> {
    /// 已接受，携带服务端确认后的实体
    Accepted(E),
    /// 已拒绝，未做任何修改
    Rejected(ValidationReport),
}

impl<E> ValidationOutcome<E> {
    /// 借助 presenter 把应答归类为接受或拒绝
    pub fn classify(reply: UpdateReply<E>, presenter: &dyn ValidationPresenter) -> Self {
        if presenter.is_rejection(&reply.report) {
            ValidationOutcome::Rejected(reply.report)
        } else {
            ValidationOutcome::Accepted(reply.entity)
        }
    }

    pub fn is_rejected(&self) -> bool {
        matches!(self, ValidationOutcome::Rejected(_))
    }
}

/// 校验结果判定边界
///
/// 只负责判断是否为拒绝；提示框等展示不在这里处理。
pub trait ValidationPresenter: Send + Sync {
    fn is_rejection(&self, report: &ValidationReport) -> bool;
}

/// 默认判定：存在 error 级问题即拒绝，warning 放行
#[derive(Debug, Clone, Copy, Default)]
pub struct SeverityPresenter;

impl ValidationPresenter for SeverityPresenter {
    fn is_rejection(&self, report: &ValidationReport) -> bool {
        report.has_errors()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn warnings_do_not_reject() {
        let report = ValidationReport::new(vec![ValidationIssue::warning(
            Some("status"),
            "status is unusual",
        )]);
        assert!(!SeverityPresenter.is_rejection(&report));

        let outcome = ValidationOutcome::classify(
            UpdateReply::rejected("ok", report),
            &SeverityPresenter,
        );
        assert!(matches!(outcome, ValidationOutcome::Accepted("ok")));
    }

    #[test]
    fn errors_reject() {
        let outcome = ValidationOutcome::classify(
            UpdateReply::rejected(1, ValidationReport::rejected("invalid type")),
            &SeverityPresenter,
        );
        match outcome {
            ValidationOutcome::Rejected(report) => {
                assert_eq!(report.messages(), vec!["invalid type".to_string()])
            }
            other => panic!("expected rejection, got {:?}", other),
        }
    }

    #[test]
    fn parses_reason_payload() {
        let report = ValidationReport::from_json(&json!({"reason": "invalid type"})).unwrap();
        assert!(report.has_errors());
        assert_eq!(report.to_string(), "invalid type");
    }

    #[test]
    fn parses_structured_payload() {
        let report = ValidationReport::from_json(&json!({
            "issues": [
                {"field": "type", "message": "unknown type"},
                {"field": "status", "message": "status is unusual", "severity": "warning"},
                {"message": "record is locked"}
            ]
        }))
        .unwrap();

        assert_eq!(report.issues.len(), 3);
        assert_eq!(report.issues_for("type").count(), 1);
        assert_eq!(report.issues[0].severity, IssueSeverity::Error);
        assert_eq!(report.issues[1].severity, IssueSeverity::Warning);
        assert_eq!(report.issues[2].field, None);
        assert_eq!(report.to_string(), "unknown type; status is unusual; record is locked");
    }

    #[test]
    fn parses_bare_array_payload() {
        let report =
            ValidationReport::from_json(&json!([{"field": "type", "message": "required"}])).unwrap();
        assert_eq!(report.messages(), vec!["required".to_string()]);
    }
}
