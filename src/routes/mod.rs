//! HTTP routes
//!
//! Every API route lives under `/api`. Handlers parse ids and bodies, call a
//! service and map the result to a camelCase view.

pub mod auth_routes;
pub mod comments;
pub mod dto;
pub mod elections;
pub mod extract;
pub mod health;
pub mod notifications;
pub mod polls;
pub mod system;

use axum::routing::{get, post, put};
use axum::Router;
use std::sync::Arc;

use crate::server::AppState;

pub use extract::{AdminUser, AuthUser, MaybeUser};

/// Routes mounted under `/api`
pub fn api_router() -> Router<Arc<AppState>> {
    Router::new()
        // Accounts
        .route("/auth/signup", post(auth_routes::signup))
        .route("/auth/login", post(auth_routes::login))
        .route(
            "/auth/profile",
            get(auth_routes::get_profile).put(auth_routes::update_profile),
        )
        .route("/auth/search", get(auth_routes::search_users))
        // Polls
        .route("/polls", get(polls::feed).post(polls::create_poll))
        .route("/polls/trending", get(polls::trending))
        .route("/polls/me", get(polls::my_polls))
        .route("/polls/pending", get(polls::pending))
        .route("/polls/:id/status", put(polls::moderate))
        .route(
            "/polls/:id",
            get(polls::get_poll)
                .put(polls::update_poll)
                .delete(polls::delete_poll),
        )
        .route("/polls/:id/vote", post(polls::vote))
        .route("/polls/:id/consciousness", post(polls::add_consciousness_entry))
        // Comments
        .route(
            "/polls/:id/comments",
            get(comments::list_comments).post(comments::add_comment),
        )
        .route(
            "/polls/:id/comments/:comment_id/react",
            post(comments::react),
        )
        // Notifications
        .route("/notifications", get(notifications::list))
        .route("/notifications/read-all", put(notifications::mark_all_read))
        .route("/notifications/:id/read", put(notifications::mark_read))
        // Elections
        .route("/election/apply", post(elections::apply))
        .route("/election/me", get(elections::my_candidacy))
        .route("/election/candidates", get(elections::approved_candidates))
        .route("/election/join", post(elections::join_election))
        .route("/election/all", get(elections::all_candidates))
        .route("/election/:id/status", put(elections::set_candidate_status))
        .route("/election/create", post(elections::create_election))
        .route("/election/list", get(elections::list_elections))
        .route(
            "/election/election/:id/status",
            put(elections::set_election_status),
        )
        // System
        .route("/system/mood", get(system::mood))
}
