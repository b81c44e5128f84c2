//! Migrates Grafana operator `integreatly.org/v1alpha1` resources to
//! `grafana.integreatly.org/v1beta1`, keeping both live during the transition.

pub mod api;
pub mod codec;
pub mod config;
pub mod controller;
pub mod convert;
pub mod error;
pub mod reconcile;
pub mod store;
pub mod types;
pub mod watch;

pub use config::{ConflictPolicy, ConverterConfig, WatchScope};
pub use controller::{ConverterController, SourceWatcher};
pub use convert::{Convert, ConversionOutput};
pub use error::{ConverterError, ConverterResult};
pub use reconcile::{ReconcileOutcome, ReconcilePipeline};
pub use types::ResourceKind;
