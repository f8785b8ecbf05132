//! Halo exchange between mesh partitions.
//!
//! Arrays exchanged here are laid out per element with a fixed number of
//! entries: local elements first, halo elements in the tail. An exchange
//! overwrites the tail with the owners' current values.
//!
//! The asynchronous form is a `exchange_start` / `exchange_finish` pair so
//! interior work can overlap communication; [`HaloExchange::exchange`] is
//! the blocking composition. A distributed backend implements this trait
//! on top of its transport; [`SerialHalo`] and [`MirrorHalo`] cover single
//! process runs.

/// Halo exchange and global reductions.
pub trait HaloExchange {
    /// Name for logging.
    fn name(&self) -> &'static str;

    /// Number of halo elements received into the tail.
    fn n_halo(&self) -> usize;

    /// Post sends of the owned entries of `data`.
    fn exchange_start(&mut self, data: &[f64], entries_per_element: usize);

    /// Complete a posted exchange, writing into the halo tail of `data`.
    fn exchange_finish(&mut self, data: &mut [f64], entries_per_element: usize);

    /// Blocking exchange of `f64` data.
    fn exchange(&mut self, data: &mut [f64], entries_per_element: usize) {
        self.exchange_start(data, entries_per_element);
        self.exchange_finish(data, entries_per_element);
    }

    /// Blocking exchange of integer data (degrees, levels, flags).
    fn exchange_indices(&mut self, data: &mut [usize], entries_per_element: usize);

    /// Global maximum.
    fn all_reduce_max(&self, value: f64) -> f64;

    /// Global minimum.
    fn all_reduce_min(&self, value: f64) -> f64;

    /// Global sum of counts.
    fn all_reduce_sum(&self, value: usize) -> usize;
}

/// Single partition without halo.
#[derive(Clone, Copy, Debug, Default)]
pub struct SerialHalo;

impl HaloExchange for SerialHalo {
    fn name(&self) -> &'static str {
        "Serial"
    }

    fn n_halo(&self) -> usize {
        0
    }

    fn exchange_start(&mut self, _data: &[f64], _entries_per_element: usize) {}

    fn exchange_finish(&mut self, _data: &mut [f64], _entries_per_element: usize) {}

    fn exchange_indices(&mut self, _data: &mut [usize], _entries_per_element: usize) {}

    fn all_reduce_max(&self, value: f64) -> f64 {
        value
    }

    fn all_reduce_min(&self, value: f64) -> f64 {
        value
    }

    fn all_reduce_sum(&self, value: usize) -> usize {
        value
    }
}

/// In-process halo: halo element `h` mirrors local element `sources[h]`.
///
/// Models periodic connections within one partition and serves as the
/// reference behaviour for distributed backends in tests.
#[derive(Clone, Debug)]
pub struct MirrorHalo {
    n_elements: usize,
    sources: Vec<usize>,
    send: Vec<f64>,
}

impl MirrorHalo {
    /// Halo of `sources.len()` elements after `n_elements` locals.
    pub fn new(n_elements: usize, sources: Vec<usize>) -> Self {
        debug_assert!(sources.iter().all(|&s| s < n_elements));
        Self {
            n_elements,
            sources,
            send: Vec::new(),
        }
    }
}

impl HaloExchange for MirrorHalo {
    fn name(&self) -> &'static str {
        "Mirror"
    }

    fn n_halo(&self) -> usize {
        self.sources.len()
    }

    fn exchange_start(&mut self, data: &[f64], entries_per_element: usize) {
        self.send.clear();
        for &src in &self.sources {
            let start = src * entries_per_element;
            self.send
                .extend_from_slice(&data[start..start + entries_per_element]);
        }
    }

    fn exchange_finish(&mut self, data: &mut [f64], entries_per_element: usize) {
        let tail = self.n_elements * entries_per_element;
        let len = self.send.len().min(data.len().saturating_sub(tail));
        data[tail..tail + len].copy_from_slice(&self.send[..len]);
    }

    fn exchange_indices(&mut self, data: &mut [usize], entries_per_element: usize) {
        for (h, &src) in self.sources.iter().enumerate() {
            let dst = (self.n_elements + h) * entries_per_element;
            let from = src * entries_per_element;
            for k in 0..entries_per_element {
                data[dst + k] = data[from + k];
            }
        }
    }

    fn all_reduce_max(&self, value: f64) -> f64 {
        value
    }

    fn all_reduce_min(&self, value: f64) -> f64 {
        value
    }

    fn all_reduce_sum(&self, value: usize) -> usize {
        value
    }
}
