use std::sync::Arc;
use std::sync::atomic::AtomicUsize;
use std::sync::atomic::Ordering::Relaxed;
use std::thread;
use std::time::Duration;

use static_assertions::assert_impl_all;

use crate::{Config, DefaultConfig, Error, SharedTimedMutex};

assert_impl_all!(SharedTimedMutex: Default, Send, Sync, std::fmt::Debug);
assert_impl_all!(Error: Copy, Send, Sync, std::error::Error);

#[cfg_attr(miri, ignore = "Tokio is not compatible with Miri")]
#[tokio::test(flavor = "multi_thread", worker_threads = 16)]
async fn lock_async() {
    let num_tasks = 64;

    let lock: Arc<SharedTimedMutex> = Arc::default();
    let check = Arc::new(AtomicUsize::new(0));

    lock.acquire_exclusive_async().await;
    check.fetch_add(usize::MAX, Relaxed);

    let mut tasks = Vec::new();
    for i in 0..num_tasks {
        let lock = lock.clone();
        let check = check.clone();
        tasks.push(tokio::spawn(async move {
            if i % 8 == 0 {
                lock.acquire_shared_sync();
            } else {
                lock.acquire_shared_async().await;
            }
            assert_ne!(check.fetch_add(1, Relaxed), usize::MAX);
            check.fetch_sub(1, Relaxed);
            assert!(lock.release_shared().is_ok());
            lock.acquire_shared_async().await;
            assert!(lock.release_shared().is_ok());
        }));
    }

    tokio::time::sleep(Duration::from_millis(50)).await;
    check.fetch_sub(usize::MAX, Relaxed);
    assert!(lock.release_exclusive().is_ok());

    for task in tasks {
        task.await.unwrap();
    }
    assert_eq!(check.load(Relaxed), 0);

    lock.acquire_exclusive_async().await;
    assert!(lock.release_exclusive().is_ok());
}

#[test]
fn lock_sync() {
    let num_threads = if cfg!(miri) { 4 } else { 16 };
    let num_iters = if cfg!(miri) { 16 } else { 256 };

    let lock: Arc<SharedTimedMutex> = Arc::default();
    let check = Arc::new(AtomicUsize::new(0));

    lock.acquire_exclusive_sync();
    check.fetch_add(usize::MAX, Relaxed);

    let mut threads = Vec::new();
    for _ in 0..num_threads {
        let lock = lock.clone();
        let check = check.clone();
        threads.push(thread::spawn(move || {
            for j in 0..num_iters {
                if j % 11 == 0 {
                    lock.acquire_exclusive_sync();
                    assert_eq!(check.fetch_add(usize::MAX, Relaxed), 0);
                    thread::sleep(Duration::from_micros(1));
                    check.fetch_sub(usize::MAX, Relaxed);
                    assert!(lock.release_exclusive().is_ok());
                } else {
                    lock.acquire_shared_sync();
                    assert!(check.fetch_add(1, Relaxed) < num_threads);
                    thread::sleep(Duration::from_micros(1));
                    check.fetch_sub(1, Relaxed);
                    assert!(lock.release_shared().is_ok());
                }
            }
        }));
    }

    thread::sleep(Duration::from_micros(1));
    check.fetch_sub(usize::MAX, Relaxed);
    assert!(lock.release_exclusive().is_ok());

    for thread in threads {
        thread.join().unwrap();
    }
    assert_eq!(check.load(Relaxed), 0);
    assert!(lock.is_free());
}

#[cfg_attr(miri, ignore = "Tokio is not compatible with Miri")]
#[tokio::test(flavor = "multi_thread", worker_threads = 16)]
async fn lock_chaos() {
    let num_tasks = 16;
    let num_iters = 512;

    let lock: Arc<SharedTimedMutex> = Arc::default();
    let check = Arc::new(AtomicUsize::new(0));

    let mut threads = Vec::new();
    let mut tasks = Vec::new();
    for i in 0..num_tasks {
        let lock = lock.clone();
        let check = check.clone();
        if i % 2 == 0 {
            tasks.push(tokio::spawn(async move {
                for j in 0..num_iters {
                    let acquired = match j % 5 {
                        0 => {
                            lock.acquire_exclusive_async().await;
                            Some(true)
                        }
                        1 => lock
                            .try_acquire_exclusive_for(Duration::from_micros(50))
                            .await
                            .then_some(true),
                        2 => lock
                            .try_acquire_shared_for(Duration::from_micros(50))
                            .await
                            .then_some(false),
                        3 => tokio::time::timeout(
                            Duration::from_micros(20),
                            lock.acquire_exclusive_async(),
                        )
                        .await
                        .ok()
                        .map(|()| true),
                        _ => {
                            lock.acquire_shared_async().await;
                            Some(false)
                        }
                    };
                    match acquired {
                        Some(true) => {
                            assert_eq!(check.fetch_add(usize::MAX, Relaxed), 0);
                            check.fetch_sub(usize::MAX, Relaxed);
                            assert!(lock.release_exclusive().is_ok());
                        }
                        Some(false) => {
                            assert!(check.fetch_add(1, Relaxed) < num_tasks);
                            check.fetch_sub(1, Relaxed);
                            assert!(lock.release_shared().is_ok());
                        }
                        None => (),
                    }
                }
            }));
        } else {
            threads.push(thread::spawn(move || {
                for j in 0..num_iters {
                    if j % 7 == 3 {
                        if lock.try_acquire_exclusive_for_sync(Duration::from_micros(50)) {
                            assert_eq!(check.fetch_add(usize::MAX, Relaxed), 0);
                            check.fetch_sub(usize::MAX, Relaxed);
                            assert!(lock.release_exclusive().is_ok());
                        }
                    } else if j % 11 == 0 {
                        lock.acquire_exclusive_sync();
                        assert_eq!(check.fetch_add(usize::MAX, Relaxed), 0);
                        check.fetch_sub(usize::MAX, Relaxed);
                        assert!(lock.release_exclusive().is_ok());
                    } else {
                        lock.acquire_shared_sync();
                        assert!(check.fetch_add(1, Relaxed) < num_tasks);
                        check.fetch_sub(1, Relaxed);
                        assert!(lock.release_shared().is_ok());
                    }
                }
            }));
        }
    }

    for thread in threads {
        thread.join().unwrap();
    }
    for task in tasks {
        task.await.unwrap();
    }
    assert_eq!(check.load(Relaxed), 0);
    assert!(lock.is_free());
    assert_eq!(lock.waiter_count(), 0);
}

#[cfg_attr(miri, ignore = "Tokio is not compatible with Miri")]
#[tokio::test(start_paused = true)]
async fn timed_exclusive_expires() {
    let lock: SharedTimedMutex = SharedTimedMutex::new();
    assert!(lock.try_acquire_exclusive());

    let start = tokio::time::Instant::now();
    assert!(!lock.try_acquire_exclusive_for(Duration::from_millis(50)).await);
    assert!(start.elapsed() >= Duration::from_millis(50));
    assert_eq!(lock.waiter_count(), 0);

    assert!(lock.release_exclusive().is_ok());
    assert!(lock.is_free());
}

#[cfg_attr(miri, ignore = "Tokio is not compatible with Miri")]
#[tokio::test(start_paused = true)]
async fn timed_shared_granted() {
    let lock: Arc<SharedTimedMutex> = Arc::default();
    assert!(lock.try_acquire_exclusive());

    let releaser = {
        let lock = lock.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(10)).await;
            assert!(lock.release_exclusive().is_ok());
        })
    };

    let start = tokio::time::Instant::now();
    assert!(lock.try_acquire_shared_for(Duration::from_millis(50)).await);
    assert!(start.elapsed() < Duration::from_millis(50));
    assert_eq!(lock.shared_count(), 1);
    releaser.await.unwrap();

    // The expiry of the granted request has been cancelled.
    tokio::time::sleep(Duration::from_millis(100)).await;
    assert_eq!(lock.shared_count(), 1);
    assert!(lock.release_shared().is_ok());
}

#[cfg_attr(miri, ignore = "Tokio is not compatible with Miri")]
#[tokio::test(start_paused = true)]
async fn timed_until() {
    let lock: SharedTimedMutex = SharedTimedMutex::new();

    // A past deadline still takes the fast path.
    let past = DefaultConfig::now();
    tokio::time::advance(Duration::from_millis(10)).await;
    assert!(lock.try_acquire_shared_until(past).await);
    assert!(!lock.try_acquire_exclusive_until(past).await);

    let start = tokio::time::Instant::now();
    let deadline = DefaultConfig::now() + Duration::from_millis(30);
    assert!(!lock.try_acquire_exclusive_until(deadline).await);
    assert!(start.elapsed() >= Duration::from_millis(30));
    assert!(start.elapsed() < Duration::from_millis(60));

    assert!(lock.release_shared().is_ok());
    assert!(lock.try_acquire_exclusive_until(deadline).await);
    assert!(lock.release_exclusive().is_ok());
}

#[cfg_attr(miri, ignore = "Tokio is not compatible with Miri")]
#[tokio::test(start_paused = true)]
async fn expired_writer_lets_readers_in() {
    let lock: Arc<SharedTimedMutex> = Arc::default();
    assert!(lock.try_acquire_shared());

    let writer = {
        let lock = lock.clone();
        tokio::spawn(async move { lock.try_acquire_exclusive_for(Duration::from_millis(50)).await })
    };
    while lock.waiter_count() != 1 {
        tokio::task::yield_now().await;
    }
    let reader = {
        let lock = lock.clone();
        tokio::spawn(async move { lock.acquire_shared_async().await })
    };
    while lock.waiter_count() != 2 {
        tokio::task::yield_now().await;
    }
    assert_eq!(lock.shared_count(), 1);

    assert!(!writer.await.unwrap());
    reader.await.unwrap();
    assert_eq!(lock.shared_count(), 2);
    assert_eq!(lock.waiter_count(), 0);
}

#[cfg_attr(miri, ignore = "Tokio is not compatible with Miri")]
#[tokio::test(start_paused = true)]
async fn sync_deadline_follows_system_clock() {
    let lock: SharedTimedMutex = SharedTimedMutex::new();
    assert!(lock.try_acquire_exclusive());

    let paused = DefaultConfig::now();
    let start = std::time::Instant::now();
    assert!(!lock.try_acquire_shared_until_sync(start + Duration::from_millis(5)));
    assert!(start.elapsed() >= Duration::from_millis(5));
    assert_eq!(DefaultConfig::now(), paused);
    assert_eq!(lock.waiter_count(), 0);

    assert!(lock.release_exclusive().is_ok());
}

#[test]
fn timed_sync() {
    let lock: Arc<SharedTimedMutex> = Arc::default();
    lock.acquire_exclusive_sync();

    let lock_clone = lock.clone();
    let thread =
        thread::spawn(move || lock_clone.try_acquire_shared_for_sync(Duration::from_millis(10)));
    assert!(!thread.join().unwrap());
    assert_eq!(lock.waiter_count(), 0);

    let lock_clone = lock.clone();
    let thread =
        thread::spawn(move || lock_clone.try_acquire_shared_for_sync(Duration::from_secs(60)));
    while lock.waiter_count() == 0 {
        thread::yield_now();
    }
    assert!(lock.release_exclusive().is_ok());
    assert!(thread.join().unwrap());
    assert_eq!(lock.shared_count(), 1);
    assert!(lock.release_shared().is_ok());
}

#[test]
fn drop_future() {
    let lock: Arc<SharedTimedMutex> = Arc::default();
    lock.acquire_exclusive_sync();

    let mut threads = Vec::new();
    for i in 0..2 {
        let lock = lock.clone();
        threads.push(thread::spawn(move || {
            if i == 0 {
                lock.acquire_exclusive_sync();
                assert!(lock.release_exclusive().is_ok());
            } else {
                lock.acquire_shared_sync();
                assert!(lock.release_shared().is_ok());
            }
        }));
    }

    {
        let mut exclusive = std::pin::pin!(lock.acquire_exclusive_async());
        let mut shared = std::pin::pin!(lock.acquire_shared_async());
        assert!(super::poll_once(exclusive.as_mut()).is_pending());
        assert!(super::poll_once(shared.as_mut()).is_pending());
    }
    assert!(lock.release_exclusive().is_ok());

    for thread in threads {
        thread.join().unwrap();
    }

    lock.acquire_exclusive_sync();
    assert!(lock.release_exclusive().is_ok());
    assert_eq!(lock.waiter_count(), 0);
}

#[cfg(feature = "lock_api")]
mod scoped {
    use std::sync::Arc;
    use std::time::Duration;

    use crate::{RwLock, read_async, try_read_for, try_write_for, try_write_until, write_async};
    use crate::{Config, DefaultConfig, Mutex, lock_async, try_lock_for};

    #[cfg_attr(miri, ignore = "Tokio is not compatible with Miri")]
    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn rwlock_async() {
        let num_tasks = 32;

        let rwlock = Arc::new(RwLock::new(0_usize));

        let mut tasks = Vec::new();
        for i in 0..num_tasks {
            let rwlock = rwlock.clone();
            tasks.push(tokio::spawn(async move {
                if i % 4 == 0 {
                    *write_async(&rwlock).await += 1;
                } else {
                    let guard = read_async(&rwlock).await;
                    assert!(*guard <= num_tasks / 4);
                }
            }));
        }
        for task in tasks {
            task.await.unwrap();
        }
        assert_eq!(*rwlock.read(), num_tasks / 4);
    }

    #[cfg_attr(miri, ignore = "Tokio is not compatible with Miri")]
    #[tokio::test(start_paused = true)]
    #[allow(clippy::await_holding_lock)]
    async fn rwlock_timed() {
        let rwlock = RwLock::new(0_usize);

        let reader = rwlock.read();
        assert!(try_write_for(&rwlock, Duration::from_millis(10)).await.is_none());
        assert_eq!(try_read_for(&rwlock, Duration::from_millis(10)).await.map(|g| *g), Some(0));
        drop(reader);

        let deadline = DefaultConfig::now() + Duration::from_millis(10);
        let mut writer = try_write_until(&rwlock, deadline).await.unwrap();
        *writer += 1;
        assert!(try_read_for(&rwlock, Duration::from_millis(10)).await.is_none());
        drop(writer);

        assert_eq!(*rwlock.read(), 1);
        assert!(!rwlock.is_locked());
    }

    #[cfg_attr(miri, ignore = "Tokio is not compatible with Miri")]
    #[tokio::test(start_paused = true)]
    #[allow(clippy::await_holding_lock)]
    async fn mutex_timed() {
        let mutex = Mutex::new(0_usize);

        let mut guard = lock_async(&mutex).await;
        *guard += 1;
        assert!(try_lock_for(&mutex, Duration::from_millis(10)).await.is_none());
        assert!(mutex.try_lock_for(Duration::from_millis(1)).is_none());
        drop(guard);

        assert_eq!(try_lock_for(&mutex, Duration::from_millis(10)).await.map(|g| *g), Some(1));
        assert!(!mutex.is_locked());
    }
}
