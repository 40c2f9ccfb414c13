use actix_web::{delete, get, post, web, HttpResponse};
use chrono::Utc;
use serde_json::json;
use uuid::Uuid;
use validator::Validate;

use super::{audit, require_manage, tenant_offset, Actor};
use crate::config::Config;
use crate::database::{Database, CHAIN_BRANCH_KEY};
use crate::error::{unique_violation, ApiError};
use crate::models::{
    joins_without_invitation, AddBranchRequest, AnalyticsQuery, ApiResponse, BranchSummary, ChainBranch,
    ChainSummary, ChainWithBranches, CreateChainRequest, NewAuditLog, NewNotification, UserRole,
};
use crate::operative_day::trailing_window;
use crate::plans::PlanLimits;

/// Loads a chain the actor may manage: its owner or an admin.
async fn load_managed_chain(db: &Database, actor: &Actor, chain_id: Uuid) -> Result<ChainWithBranches, ApiError> {
    let chain = db.get_chain(chain_id).await?.ok_or(ApiError::NotFound("Chain"))?;
    require_manage(db, actor, chain.chain.owner_user_id).await?;
    Ok(chain)
}

fn branch_conflict(err: sqlx::Error) -> ApiError {
    match unique_violation(&err) {
        Some(CHAIN_BRANCH_KEY) => ApiError::Conflict("That business was already invited to this chain".into()),
        Some(_) => ApiError::Conflict("That business already belongs to a chain".into()),
        None => ApiError::from(err),
    }
}

#[post("/chains")]
pub async fn create_chain(
    db: web::Data<Database>,
    actor: Actor,
    payload: web::Json<CreateChainRequest>,
) -> Result<HttpResponse, ApiError> {
    let body = payload.into_inner();
    body.validate()?;

    let chain = db.create_chain(actor.id, body.name.trim()).await?;
    Ok(HttpResponse::Created().json(ApiResponse::success(ChainWithBranches {
        chain,
        branches: Vec::new(),
    })))
}

#[get("/chains")]
pub async fn list_chains(db: web::Data<Database>, actor: Actor) -> Result<HttpResponse, ApiError> {
    let chains = db.list_chains_for_owner(actor.id).await?;
    Ok(HttpResponse::Ok().json(ApiResponse::success(chains)))
}

/// Invitations waiting for the actor's business to accept.
#[get("/chains/invitations")]
pub async fn list_invitations(db: web::Data<Database>, actor: Actor) -> Result<HttpResponse, ApiError> {
    let invitations = db.list_chain_invitations(actor.id).await?;
    Ok(HttpResponse::Ok().json(ApiResponse::success(invitations)))
}

#[get("/chains/{chain_id}")]
pub async fn get_chain(
    db: web::Data<Database>,
    actor: Actor,
    chain_id: web::Path<Uuid>,
) -> Result<HttpResponse, ApiError> {
    let chain = load_managed_chain(&db, &actor, chain_id.into_inner()).await?;
    Ok(HttpResponse::Ok().json(ApiResponse::success(chain)))
}

/// Invites another business into the chain. The link only grants access
/// once that business accepts, unless the caller is an admin or is adding
/// its own account.
#[post("/chains/{chain_id}/branches")]
pub async fn add_branch(
    db: web::Data<Database>,
    actor: Actor,
    chain_id: web::Path<Uuid>,
    payload: web::Json<AddBranchRequest>,
) -> Result<HttpResponse, ApiError> {
    let body = payload.into_inner();
    body.validate()?;

    let chain = load_managed_chain(&db, &actor, chain_id.into_inner()).await?;
    let owner = chain.chain.owner_user_id;

    let limits = db.get_plan(owner).await?.limits();
    let current = db.count_branches_for_owner(owner).await?;
    PlanLimits::check_count(current, limits.max_branches, "branches").map_err(ApiError::Forbidden)?;

    let actor_is_admin = db.get_user_role(actor.id).await? == Some(UserRole::Admin);
    let accepted = joins_without_invitation(actor.id, body.branch_user_id, actor_is_admin);

    let branch = db
        .add_branch(chain.chain.id, &body, actor.id, accepted)
        .await
        .map_err(branch_conflict)?;

    if accepted && actor_is_admin {
        audit(
            &db,
            NewAuditLog {
                actor_id: actor.id,
                action: "chain.branch_attached",
                entity: "chain",
                entity_id: Some(chain.chain.id),
                metadata: json!({ "branch_user_id": branch.branch_user_id }),
            },
        )
        .await;
    } else if !accepted {
        invite_branch(&db, &chain, &branch).await;
    }

    Ok(HttpResponse::Created().json(ApiResponse::success(branch)))
}

/// Tells the invited business about the pending invitation. Never fails the request.
async fn invite_branch(db: &Database, chain: &ChainWithBranches, branch: &ChainBranch) {
    let notification = NewNotification {
        user_id: branch.branch_user_id,
        kind: "chain_invitation",
        title: "Invitación a una cadena".into(),
        body: format!(
            "\"{}\" quiere agregar tu negocio como sucursal \"{}\". Acepta la invitación para compartir tus resultados.",
            chain.chain.name, branch.label
        ),
    };
    if let Err(err) = db.create_notification(&notification).await {
        log::warn!("Failed to notify {} of chain invitation: {err:?}", branch.branch_user_id);
    }
}

/// The invited business accepts; from then on the chain owner manages it.
#[post("/chains/{chain_id}/branches/accept")]
pub async fn accept_branch(
    db: web::Data<Database>,
    actor: Actor,
    chain_id: web::Path<Uuid>,
) -> Result<HttpResponse, ApiError> {
    let branch = db
        .accept_branch(chain_id.into_inner(), actor.id)
        .await
        .map_err(branch_conflict)?
        .ok_or(ApiError::NotFound("Chain invitation"))?;

    log::info!("Business {} joined chain {}", branch.branch_user_id, branch.chain_id);
    Ok(HttpResponse::Ok().json(ApiResponse::success(branch)))
}

/// Removes a branch or withdraws an invitation. The branch business itself
/// may also leave or decline.
#[delete("/chains/{chain_id}/branches/{branch_user_id}")]
pub async fn remove_branch(
    db: web::Data<Database>,
    actor: Actor,
    path: web::Path<(Uuid, Uuid)>,
) -> Result<HttpResponse, ApiError> {
    let (chain_id, branch_user_id) = path.into_inner();
    let chain = db.get_chain(chain_id).await?.ok_or(ApiError::NotFound("Chain"))?;
    if actor.id != branch_user_id {
        require_manage(&db, &actor, chain.chain.owner_user_id).await?;
    }

    db.remove_branch(chain.chain.id, branch_user_id).await?;
    Ok(HttpResponse::NoContent().finish())
}

/// NPS and response totals per branch over the last `days` operative days,
/// each branch in its own time zone.
#[get("/chains/{chain_id}/summary")]
pub async fn get_chain_summary(
    db: web::Data<Database>,
    config: web::Data<Config>,
    actor: Actor,
    chain_id: web::Path<Uuid>,
    query: web::Query<AnalyticsQuery>,
) -> Result<HttpResponse, ApiError> {
    let days = query.days();
    let chain = load_managed_chain(&db, &actor, chain_id.into_inner()).await?;
    let now = Utc::now();

    let mut branches = Vec::with_capacity(chain.branches.len());
    let mut all_survey_ids = Vec::new();
    for branch in chain.branches.into_iter().filter(ChainBranch::is_accepted) {
        let survey_ids = db.list_active_survey_ids(branch.branch_user_id).await?;
        let offset = tenant_offset(&db, &config, branch.branch_user_id).await?;
        let (start, end) = trailing_window(now, days, offset);
        let summary = db.score_summary(&survey_ids, start, end, offset).await?;
        all_survey_ids.extend(survey_ids);
        branches.push(BranchSummary { branch, summary });
    }

    let chain_offset = tenant_offset(&db, &config, chain.chain.owner_user_id).await?;
    let (start, end) = trailing_window(now, days, chain_offset);
    let total = db.score_summary(&all_survey_ids, start, end, chain_offset).await?;

    Ok(HttpResponse::Ok().json(ApiResponse::success(ChainSummary {
        chain: chain.chain,
        days,
        total,
        branches,
    })))
}
