mod mainloop;
pub mod backend;

pub use backend::PulseBackend;
