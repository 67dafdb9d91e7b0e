/// Monotonic microsecond time source, the same one the edge ISRs stamp with.
pub trait MonotonicClock {
    fn now_us(&self) -> i64;
}

impl<C: MonotonicClock + ?Sized> MonotonicClock for &C {
    fn now_us(&self) -> i64 {
        (**self).now_us()
    }
}

impl<C: MonotonicClock + ?Sized> MonotonicClock for std::sync::Arc<C> {
    fn now_us(&self) -> i64 {
        (**self).now_us()
    }
}
