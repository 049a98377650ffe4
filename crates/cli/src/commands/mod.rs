pub(crate) mod describe;
pub(crate) mod report;
pub(crate) mod total;
