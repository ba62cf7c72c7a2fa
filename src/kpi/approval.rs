use crate::error::{OkrError, OkrResult};
use crate::kpi::model::KpiStatus;
use crate::session::Actor;

/// Operations gated by the approval workflow.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ApprovalAction {
    Submit,
    Approve,
    Reject,
    Edit,
    Delete,
}

impl ApprovalAction {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Submit => "submit",
            Self::Approve => "approve",
            Self::Reject => "reject",
            Self::Edit => "edit",
            Self::Delete => "delete",
        }
    }
}

/// draft -> submitted -> approved | rejected. Editing a rejected kpi
/// returns it to draft; `Delete` yields the status it was called from.
pub fn transition(from: KpiStatus, action: ApprovalAction) -> OkrResult<KpiStatus> {
    use ApprovalAction::*;
    use KpiStatus::*;

    let to = match (from, action) {
        (Draft, Submit) => Some(Submitted),
        (Submitted, Approve) => Some(Approved),
        (Submitted, Reject) => Some(Rejected),
        (s, Edit) if s.is_editable() => Some(Draft),
        (Draft, Delete) => Some(Draft),
        _ => None,
    };

    to.ok_or_else(|| OkrError::InvalidTransition {
        action: action.as_str(),
        from: from.as_str().to_string(),
    })
}

/// Role/ownership check for `action` on a kpi owned by `owner_id`.
pub fn authorize(actor: &Actor, owner_id: i32, action: ApprovalAction) -> OkrResult<()> {
    let allowed = match action {
        ApprovalAction::Submit | ApprovalAction::Edit => actor.owns(owner_id),
        ApprovalAction::Approve | ApprovalAction::Reject => actor.is_reviewer(),
        ApprovalAction::Delete => actor.owns(owner_id) || actor.is_admin(),
    };
    if allowed {
        Ok(())
    } else {
        Err(OkrError::forbidden(format!(
            "user {} ({}) may not {} kpi owned by {}",
            actor.user_id,
            actor.role,
            action.as_str(),
            owner_id
        )))
    }
}

/// Authorization first, then the state machine.
pub fn check(
    actor: &Actor,
    owner_id: i32,
    from: KpiStatus,
    action: ApprovalAction,
) -> OkrResult<KpiStatus> {
    authorize(actor, owner_id, action)?;
    transition(from, action)
}
