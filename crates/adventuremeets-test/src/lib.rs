//! Adventure meets API and scheduler - integration test support.
//!
//! This crate re-exports the workspace crates so integration tests can use
//! `adventuremeets_test::component::` paths.

pub mod component {
    pub use adventuremeets_service::{
        accounting, error, meet, predicate, remote, repository, scheduler, signup,
    };

    pub mod db {
        pub use adventuremeets_db::db::*;
        pub use adventuremeets_db::error::DbError;
    }

    pub mod model {
        pub use adventuremeets_db::model::*;
    }

    pub mod domain {
        pub use adventuremeets_core::{attendee, status};
    }

    pub mod config {
        pub use adventuremeets_app::config::ConfigHandler;
        pub use adventuremeets_core::config::*;
    }
}

pub mod app {
    pub use adventuremeets_app::repository_handler::RepositoryHandler;

    pub mod api {
        pub use adventuremeets_app::app::api::*;
    }
}
