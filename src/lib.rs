//! List, measure and download the objects under a prefix of an S3 compatible bucket
//! ```no_run
//! use bucketctl::{dispatch, Config, S3Store};
//!
//! # async fn usage() -> Result<(), bucketctl::Error> {
//! let config = Config::load("config.yml")?;
//! let store = S3Store::from_config(&config)?;
//! let total = dispatch::usage(&store, "luxedigest", "reports/").await?;
//! println!("{}", bucketctl::humanize::bytes(total));
//! # Ok(())
//! # }
//! ```
pub mod cli;
pub mod config;
pub mod dispatch;
pub mod error;
pub mod humanize;
pub mod storage;

pub use config::Config;
pub use error::Error;
pub use storage::{ObjectListing, ObjectRecord, ObjectStore, S3Store};
