use std::collections::{HashMap, HashSet};

use sqlx::PgPool;
use tracing::warn;
use uuid::Uuid;

use super::repo::{self, Invitation, InvitationStatus, Room};
use crate::error::ApiError;

/// A user named in an invite request, as found in the database.
#[derive(Debug, Clone)]
pub struct Candidate {
    pub id: Uuid,
    pub username: String,
    pub active: bool,
}

/// Room state the invite loop checks against.
#[derive(Debug, Default)]
pub struct RoomSnapshot {
    pub participants: i64,
    pub members: HashSet<Uuid>,
    pub pending: HashSet<Uuid>,
}

#[derive(Debug, Default, PartialEq)]
pub struct InvitePlan {
    /// `(receiver id, username)` in request order.
    pub invite: Vec<(Uuid, String)>,
    pub errors: Vec<String>,
}

fn room_full(max: i64) -> String {
    format!("La sala ha alcanzado el límite máximo de {max} participantes")
}

/// Decides, in request order, which targets receive an invitation.
///
/// Per-target failures are collected and skipped. Reaching capacity stops
/// the loop; invitations issued earlier in the same plan count towards it.
pub fn plan_invitations(
    inviter: Uuid,
    targets: &[Uuid],
    candidates: &HashMap<Uuid, Candidate>,
    room: &RoomSnapshot,
    max_participants: i64,
) -> InvitePlan {
    let mut plan = InvitePlan::default();
    let mut pending: HashSet<Uuid> = room.pending.clone();

    for target in targets {
        if *target == inviter {
            plan.errors.push("No puedes invitarte a ti mismo".into());
            continue;
        }
        let Some(user) = candidates.get(target) else {
            plan.errors
                .push(format!("Usuario con ID {target} no encontrado"));
            continue;
        };
        if !user.active {
            plan.errors
                .push(format!("Usuario {} no está activo", user.username));
            continue;
        }
        if room.members.contains(target) {
            plan.errors
                .push(format!("Usuario {} ya es miembro de la sala", user.username));
            continue;
        }
        if pending.contains(target) {
            plan.errors.push(format!(
                "Usuario {} ya tiene una invitación pendiente",
                user.username
            ));
            continue;
        }
        if room.participants + plan.invite.len() as i64 >= max_participants {
            plan.errors.push(room_full(max_participants));
            break;
        }
        pending.insert(*target);
        plan.invite.push((user.id, user.username.clone()));
    }
    plan
}

pub fn invite_summary(sent: usize) -> String {
    if sent > 0 {
        format!("Se enviaron {sent} invitaciones")
    } else {
        "No se pudo enviar ninguna invitación".into()
    }
}

/// Receiver and state checks shared by accept and reject.
pub fn check_answerable(inv: &Invitation, user_id: Uuid) -> Result<(), ApiError> {
    if inv.receiver_id != user_id {
        return Err(ApiError::forbidden("Esta invitación no es para ti"));
    }
    if inv.status != InvitationStatus::Pending {
        return Err(ApiError::validation("Esta invitación ya ha sido procesada"));
    }
    Ok(())
}

pub fn check_room_capacity(members: i64, max_participants: i64) -> Result<(), ApiError> {
    if members >= max_participants {
        return Err(ApiError::capacity(room_full(max_participants)));
    }
    Ok(())
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LeaveOutcome {
    DeleteRoom,
    Remaining(i64),
}

/// What happens to a room when one of its `members` leaves.
pub fn leave_outcome(members: i64) -> LeaveOutcome {
    match (members - 1).max(0) {
        0 => LeaveOutcome::DeleteRoom,
        n => LeaveOutcome::Remaining(n),
    }
}

pub fn room_not_found() -> ApiError {
    ApiError::not_found("Sala no encontrada")
}

fn invitation_not_found() -> ApiError {
    ApiError::not_found("Invitación no encontrada")
}

#[derive(Debug)]
pub struct Accepted {
    pub invitation: Invitation,
    pub participants: i64,
}

/// Joins the receiver to the invitation's room in one transaction.
///
/// The room row is locked before the invitation row, the order every
/// room-mutating path follows. A capacity failure rolls back and leaves the
/// invitation pending.
pub async fn accept_invitation(
    db: &PgPool,
    user_id: Uuid,
    invitation_id: Uuid,
    max_participants: i64,
) -> Result<Accepted, ApiError> {
    let room_id = Invitation::find(db, invitation_id)
        .await?
        .ok_or_else(invitation_not_found)?
        .room_id;

    let mut tx = db.begin().await?;
    // A room deleted meanwhile took its invitations with it.
    Room::lock(&mut tx, room_id)
        .await?
        .ok_or_else(invitation_not_found)?;
    let invitation = Invitation::lock(&mut tx, invitation_id)
        .await?
        .ok_or_else(invitation_not_found)?;
    check_answerable(&invitation, user_id)?;

    let members = repo::member_ids(&mut tx, room_id).await?.len() as i64;
    if let Err(e) = check_room_capacity(members, max_participants) {
        warn!(room_id = %room_id, members, "room full, invitation left pending");
        return Err(e);
    }

    repo::add_member(&mut tx, user_id, room_id).await?;
    let participants = members + 1;
    Room::set_participants(&mut tx, room_id, participants).await?;
    Invitation::set_status(&mut tx, invitation.id, InvitationStatus::Accepted).await?;
    tx.commit().await?;

    Ok(Accepted {
        invitation,
        participants,
    })
}

/// Removes `user_id` from the room, deleting the room when nobody is left.
pub async fn leave_room(db: &PgPool, user_id: Uuid, room_id: Uuid) -> Result<LeaveOutcome, ApiError> {
    let mut tx = db.begin().await?;
    Room::lock(&mut tx, room_id).await?.ok_or_else(room_not_found)?;
    if !repo::is_member(&mut *tx, user_id, room_id).await? {
        return Err(ApiError::validation("No eres miembro de esta sala"));
    }

    let members = repo::member_ids(&mut tx, room_id).await?.len() as i64;
    repo::remove_member(&mut tx, user_id, room_id).await?;
    let outcome = leave_outcome(members);
    match outcome {
        LeaveOutcome::DeleteRoom => Room::delete(&mut tx, room_id).await?,
        LeaveOutcome::Remaining(n) => Room::set_participants(&mut tx, room_id, n).await?,
    }
    tx.commit().await?;
    Ok(outcome)
}
