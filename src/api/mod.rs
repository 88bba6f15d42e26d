pub(crate) mod errors;
pub(crate) mod guards;
pub(crate) mod handlers;
pub(crate) mod params;
pub(crate) mod router;
pub(crate) mod staff_grader;
