mod adam;
mod gradient_descent;
mod optimizer;

pub use adam::{Adam, DEFAULT_BETA1, DEFAULT_BETA2, DEFAULT_EPSILON};
pub use gradient_descent::GradientDescent;
pub use optimizer::Optimizer;
