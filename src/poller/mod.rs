mod convergence;

pub(crate) use convergence::ConvergencePoller;
