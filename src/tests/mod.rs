#[cfg(not(feature = "loom"))]
mod unit_tests;

/// Polls the future once without registering a meaningful waker.
#[cfg(not(feature = "loom"))]
pub(crate) fn poll_once<F: std::future::Future + ?Sized>(
    future: std::pin::Pin<&mut F>,
) -> std::task::Poll<F::Output> {
    future.poll(&mut std::task::Context::from_waker(std::task::Waker::noop()))
}
