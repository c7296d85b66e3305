use std::alloc::{GlobalAlloc, Layout, System};
use std::sync::atomic::{AtomicUsize, Ordering};

use faer_core::Mat;
use lasso_rs::{LassoFitter, LassoOptions};

struct CountingAlloc;

static ALLOC_TOTAL: AtomicUsize = AtomicUsize::new(0);

#[global_allocator]
static GLOBAL: CountingAlloc = CountingAlloc;

unsafe impl GlobalAlloc for CountingAlloc {
    unsafe fn alloc(&self, layout: Layout) -> *mut u8 {
        let ptr = unsafe { System.alloc(layout) };
        if !ptr.is_null() {
            ALLOC_TOTAL.fetch_add(layout.size(), Ordering::Relaxed);
        }
        ptr
    }

    unsafe fn alloc_zeroed(&self, layout: Layout) -> *mut u8 {
        let ptr = unsafe { System.alloc_zeroed(layout) };
        if !ptr.is_null() {
            ALLOC_TOTAL.fetch_add(layout.size(), Ordering::Relaxed);
        }
        ptr
    }

    unsafe fn dealloc(&self, ptr: *mut u8, layout: Layout) {
        unsafe {
            System.dealloc(ptr, layout);
        }
    }

    unsafe fn realloc(&self, ptr: *mut u8, layout: Layout, new_size: usize) -> *mut u8 {
        let new_ptr = unsafe { System.realloc(ptr, layout, new_size) };
        if !new_ptr.is_null() {
            ALLOC_TOTAL.fetch_add(new_size, Ordering::Relaxed);
        }
        new_ptr
    }
}

fn reset_alloc_counter() {
    ALLOC_TOTAL.store(0, Ordering::SeqCst);
}

fn allocated_bytes() -> usize {
    ALLOC_TOTAL.load(Ordering::SeqCst)
}

// Sweeps, pruning and the exclusion test reuse the fitter's buffers.
#[test]
fn solve_reuses_fitter_buffers() {
    let x = Mat::from_fn(60, 8, |i, j| ((i * 7919 + j * 104_729) % 1000) as f64 / 500.0 - 1.0);
    let y: Vec<f64> = (0..60)
        .map(|i| 1.5 * x.read(i, 1) - 0.75 * x.read(i, 4) + 0.01 * (i as f64).cos())
        .collect();
    let options = LassoOptions::default();

    let mut fitter = LassoFitter::new(x.as_ref(), &y, 0.05).unwrap();
    reset_alloc_counter();
    let stats = fitter.solve(&options, None).unwrap();
    let alloc = allocated_bytes();
    assert!(stats.sweeps > 1);
    assert!(alloc <= 1_024, "allocations too high: {alloc}");
}
