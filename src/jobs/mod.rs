//! Job system - postings, the board, and candidates agents choose from
//!
//! Anything that wants work done posts a `JobPosting`. Agents (or whatever
//! decides for them) ask the board for their options, score them, and
//! execute one.

pub mod posting;
pub mod board;

pub use posting::JobPosting;
pub use board::{CandidateFactory, CandidateSource, JobBoard, JobCandidate, PersonalJob};
