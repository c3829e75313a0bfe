//! Compare local OpenShift templates against live cluster state and
//! reconcile the two.
//!
//! Local templates are rendered with `oc process`, live resources are
//! exported with `oc get`, and both sides are normalized before being
//! compared per kind. The resulting [`changeset::Changeset`]s can be shown
//! as diffs or applied back to the cluster.

pub mod apply;
pub mod changeset;
pub mod collection;
pub mod commands;
pub mod config;
pub mod document;
pub mod export;
pub mod filter;
pub mod kind;
pub mod local;
pub mod normalize;
pub mod oc;
pub mod output;
pub mod plan;
pub mod remote;
pub mod telemetry;
pub mod yaml;
