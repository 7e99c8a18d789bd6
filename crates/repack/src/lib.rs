//! # repack-engine
//!
//! Job orchestration and archive-conversion pipeline: accepts zip paths,
//! extracts image entries, converts them to JPEG, repackages everything into
//! a new archive next to the input, and reports structured progress over an
//! event channel, one job at a time, with cooperative cancellation.
//!
//! The engine is UI-agnostic: a consumer enqueues paths on the [`JobQueue`]
//! and reads [`QueueEvent`]s from the receiving half returned by
//! [`JobQueue::new`].
//!
//! ```no_run
//! # async fn demo() {
//! use repack_engine::{JobQueue, QueueEvent};
//!
//! let (queue, mut events) = JobQueue::new();
//! queue.enqueue(["/photos/holiday.zip"]);
//!
//! while let Some(event) = events.recv().await {
//!     match event {
//!         QueueEvent::Progress(p) => println!("{}/{}", p.current_file, p.total_files),
//!         QueueEvent::JobComplete { output_path, .. } => println!("done: {output_path}"),
//!         QueueEvent::JobFailed { error, .. } => eprintln!("failed: {error}"),
//!     }
//! }
//! # }
//! ```

pub mod archive;
mod collision;
pub mod convert;
pub mod error;
pub mod events;
pub mod job;
pub mod pipeline;
pub mod queue;
mod report;

pub use convert::{ConvertError, ImageConverter};
pub use error::PipelineError;
pub use events::{EventReceiver, EventSender, ProgressReporter, QueueEvent};
pub use job::{Job, JobStatus, Phase, Progress};
pub use pipeline::{ConversionPipeline, PipelineOutcome};
pub use queue::JobQueue;
pub use report::{REPORT_ENTRY_NAME, ReportStats};
