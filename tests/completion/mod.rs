//! Manual completion and observation of a single node
//!
//! Single assignment, cancellation, obtrusion and the blocking accessors.

mod obtrude;
