//! Persisted client identity and roster revalidation on (re)entry.
//!
//! The only state a client persists is `(player_id, nickname)`. Role, team,
//! and leadership are re-derived from the freshest roster every time, so a
//! client can never act on a role it no longer holds.

use std::{
    env, fs, io,
    path::{Path, PathBuf},
};

use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::{
    dto::session::PlayerSummary,
    sync::api::SessionApi,
};

/// Default on-disk location of the identity file.
const DEFAULT_IDENTITY_PATH: &str = ".crisis-room/identity.json";
/// Environment variable that overrides [`DEFAULT_IDENTITY_PATH`].
const IDENTITY_PATH_ENV: &str = "CRISIS_ROOM_IDENTITY_PATH";

/// The persisted client-local identity.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StoredIdentity {
    /// Roster id issued at join time.
    pub player_id: Uuid,
    /// Nickname chosen at join time.
    pub nickname: String,
}

/// Reads and writes the identity file.
#[derive(Debug, Clone)]
pub struct IdentityStore {
    path: PathBuf,
}

impl IdentityStore {
    /// Store at the default path, honoring the environment override.
    pub fn from_env() -> Self {
        let path = env::var_os(IDENTITY_PATH_ENV)
            .map(PathBuf::from)
            .filter(|p| !p.as_os_str().is_empty())
            .unwrap_or_else(|| PathBuf::from(DEFAULT_IDENTITY_PATH));
        Self { path }
    }

    /// Store at an explicit path.
    pub fn at(path: impl AsRef<Path>) -> Self {
        Self {
            path: path.as_ref().to_path_buf(),
        }
    }

    /// Load the persisted identity, if a readable one exists. A missing or
    /// unparsable file is treated as no identity.
    pub fn load(&self) -> Option<StoredIdentity> {
        let contents = fs::read_to_string(&self.path).ok()?;
        match serde_json::from_str(&contents) {
            Ok(identity) => Some(identity),
            Err(err) => {
                debug!(path = %self.path.display(), error = %err, "discarding unparsable identity file");
                None
            }
        }
    }

    /// Persist an identity, creating parent directories as needed.
    pub fn save(&self, identity: &StoredIdentity) -> io::Result<()> {
        if let Some(parent) = self.path.parent()
            && !parent.as_os_str().is_empty()
        {
            fs::create_dir_all(parent)?;
        }
        let contents = serde_json::to_string_pretty(identity)
            .map_err(|err| io::Error::new(io::ErrorKind::InvalidData, err))?;
        fs::write(&self.path, contents)
    }

    /// Remove the persisted identity. Missing files are fine.
    pub fn clear(&self) {
        if let Err(err) = fs::remove_file(&self.path)
            && err.kind() != io::ErrorKind::NotFound
        {
            warn!(path = %self.path.display(), error = %err, "failed to clear identity file");
        }
    }
}

/// Outcome of validating a held identity against the session roster.
#[derive(Debug, Clone, PartialEq)]
pub enum Reconnection {
    /// The player is still in the roster; role and team come from this
    /// authoritative entry, never from a cached copy.
    Restored {
        /// The authoritative roster entry.
        player: PlayerSummary,
    },
    /// No usable identity: the caller must run the join flow again.
    Rejoin,
}

/// Validate a persisted identity against the session's current roster.
///
/// Absent identity, a missing roster entry, or a failed lookup all clear the
/// stored identity and yield [`Reconnection::Rejoin`].
pub async fn revalidate(
    api: &dyn SessionApi,
    session_id: Uuid,
    store: &IdentityStore,
) -> Reconnection {
    let Some(identity) = store.load() else {
        return Reconnection::Rejoin;
    };

    match api.validate_player(session_id, identity.player_id).await {
        Ok(player) => {
            debug!(
                %session_id,
                player_id = %player.id,
                is_leader = player.is_leader,
                "identity revalidated against roster"
            );
            Reconnection::Restored { player }
        }
        Err(err) => {
            info!(
                %session_id,
                player_id = %identity.player_id,
                error = %err,
                "identity rejected; clearing and rejoining"
            );
            store.clear();
            Reconnection::Rejoin
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        config::AppConfig,
        dto::{
            common::Actor,
            host::AssignTeamRequest,
            session::JoinSessionRequest,
        },
        services::{host_service, session_service, session_service::tests::create_request},
        state::AppState,
        sync::api::LoopbackApi,
    };

    fn scratch_store() -> IdentityStore {
        let path = env::temp_dir().join(format!("crisis-room-test-{}.json", Uuid::new_v4()));
        IdentityStore::at(path)
    }

    #[test]
    fn identity_file_round_trips() {
        let store = scratch_store();
        let identity = StoredIdentity {
            player_id: Uuid::new_v4(),
            nickname: "ada".into(),
        };

        assert!(store.load().is_none());
        store.save(&identity).unwrap();
        assert_eq!(store.load(), Some(identity));
        store.clear();
        assert!(store.load().is_none());
    }

    #[tokio::test]
    async fn revalidation_restores_roster_derived_role() {
        let state = AppState::new(AppConfig::default());
        let snapshot = session_service::create_session(&state, create_request(1, &["Blue"]))
            .await
            .unwrap();
        let joined = session_service::join_session(
            &state,
            JoinSessionRequest {
                join_code: snapshot.join_code.clone(),
                nickname: "ada".into(),
            },
        )
        .await
        .unwrap();

        let store = scratch_store();
        store
            .save(&StoredIdentity {
                player_id: joined.player.id,
                nickname: joined.player.nickname.clone(),
            })
            .unwrap();

        let api = LoopbackApi::new(state.clone());
        match revalidate(&api, snapshot.id, &store).await {
            Reconnection::Restored { player } => {
                assert!(!player.is_leader);
                assert_eq!(player.team_id, None);
            }
            other => panic!("expected restore, got {other:?}"),
        }

        // leadership granted while disconnected is visible on the next
        // revalidation, not taken from any cache
        host_service::assign_team(
            &state,
            snapshot.id,
            joined.player.id,
            AssignTeamRequest {
                team_id: snapshot.teams[0].id,
                make_leader: true,
                actor: Actor::host(),
            },
        )
        .await
        .unwrap();

        match revalidate(&api, snapshot.id, &store).await {
            Reconnection::Restored { player } => {
                assert!(player.is_leader);
                assert_eq!(player.team_id, Some(snapshot.teams[0].id));
            }
            other => panic!("expected restore, got {other:?}"),
        }
        store.clear();
    }

    #[tokio::test]
    async fn invalidated_identity_is_cleared_and_forces_rejoin() {
        let state = AppState::new(AppConfig::default());
        let snapshot = session_service::create_session(&state, create_request(1, &["Blue"]))
            .await
            .unwrap();

        let store = scratch_store();
        store
            .save(&StoredIdentity {
                player_id: Uuid::new_v4(),
                nickname: "ghost".into(),
            })
            .unwrap();

        let api = LoopbackApi::new(state.clone());
        assert_eq!(
            revalidate(&api, snapshot.id, &store).await,
            Reconnection::Rejoin
        );
        assert!(store.load().is_none(), "identity file was cleared");
    }
}
