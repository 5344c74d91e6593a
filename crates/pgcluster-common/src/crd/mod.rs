//! Custom Resource Definitions for the Postgres cluster operator

mod postgresql;

pub use postgresql::{
    ClusterPhase, Postgresql, PostgresqlSpec, PostgresqlStatus, ResourcesSpec,
};
