use tracing::{debug, error, warn};

use super::model::ElementScope;
use super::LibraryElementError;
use crate::accesscontrol::{
    library_panel_scope, AccessControl, AccessControlError, Evaluator, ACTION_LIBRARY_PANELS_READ,
};
use crate::context::RequestContext;

/// Per-candidate result of a read check
#[derive(Debug)]
pub enum Outcome {
    Include,
    Denied,
    Errored(AccessControlError),
}

pub fn read_evaluator(element_uid: &str) -> Evaluator {
    Evaluator::permission(ACTION_LIBRARY_PANELS_READ, vec![library_panel_scope(element_uid)])
}

pub async fn check_read<E: ElementScope>(
    access: &dyn AccessControl,
    ctx: &RequestContext,
    candidate: &E,
) -> Outcome {
    let evaluator = read_evaluator(candidate.element_uid());
    match access.evaluate(ctx, ctx.user(), &evaluator).await {
        Ok(true) => Outcome::Include,
        Ok(false) => Outcome::Denied,
        Err(err) => Outcome::Errored(err),
    }
}

/// Keeps the candidates the context's user may read, in input order.
///
/// A failed evaluation excludes only that candidate and never fails the
/// listing; the one top-level error is cancellation of `ctx`.
pub async fn filter_by_permission<E: ElementScope>(
    access: &dyn AccessControl,
    ctx: &RequestContext,
    candidates: Vec<E>,
) -> Result<Vec<E>, LibraryElementError> {
    let total = candidates.len();
    let mut allowed = Vec::with_capacity(total);
    let mut errored = 0usize;

    for candidate in candidates {
        if ctx.is_cancelled() {
            return Err(LibraryElementError::Cancelled);
        }

        match check_read(access, ctx, &candidate).await {
            Outcome::Include => allowed.push(candidate),
            Outcome::Denied => {
                debug!(user = %ctx.user().uid, uid = candidate.element_uid(), "library element read denied");
            }
            Outcome::Errored(err) => {
                if ctx.is_cancelled() {
                    return Err(LibraryElementError::Cancelled);
                }
                errored += 1;
                warn!(
                    user = %ctx.user().uid,
                    uid = candidate.element_uid(),
                    error = %err,
                    "skipping library element after permission evaluation failed"
                );
            }
        }
    }

    if total > 0 && errored == total {
        error!(
            user = %ctx.user().uid,
            org_id = ctx.user().org_id,
            candidates = total,
            "permission evaluation failed for every library element"
        );
    }

    Ok(allowed)
}
