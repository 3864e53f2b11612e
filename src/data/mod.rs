//! # Data Loading Module
//!
//! Sample sources consumed one sample at a time by the training loops.
//!
//! ## Key Components
//!
//! - [`SampleSource`]: yields `(input, target)` until the epoch ends, then
//!   `reset` starts the next one
//! - [`Sampler`]: index order strategies (sequential, random)
//!
//! ## Available Sources
//!
//! - [`InMemoryDataset`]: column samples with class labels, loadable from CSV
//! - [`DiskDataset`]: random points labelled by a disk in the unit square
//!
//! ## Example
//!
//! ```ignore
//! use labnet::data::{InMemoryDataset, SampleSource};
//!
//! let mut train = InMemoryDataset::from_labelled_csv("mnist_train.csv", 123456)?;
//! while let Some((x, label)) = train.next_sample() {
//!     // forward + loss
//! }
//! train.reset();
//! ```

pub mod dataset;
pub mod sampler;
pub mod toy;

pub use dataset::{DatasetError, InMemoryDataset, SampleSource};
pub use sampler::{RandomSampler, Sampler, SequentialSampler};
pub use toy::{classify, DiskDataset};
