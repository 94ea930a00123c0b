//! Bookkeeping of a single resource (PE MIPS, RAM, bandwidth) shared between VMs.

use std::fmt::{Debug, Display};
use std::ops::{AddAssign, Sub, SubAssign};

use rustc_hash::FxHashMap;

use crate::error::SimError;
use crate::vm::VmUid;

/// Relative slack used when comparing MIPS amounts.
pub const MIPS_TOLERANCE: f64 = 1e-9;

pub trait Amount: Copy + Default + PartialOrd + Debug + Display + AddAssign + SubAssign + Sub<Output = Self> {
    /// Whether `self` is strictly greater than `limit`, allowing for rounding where relevant.
    fn exceeds(self, limit: Self) -> bool;
    fn as_f64(self) -> f64;
}

impl Amount for u64 {
    fn exceeds(self, limit: Self) -> bool {
        self > limit
    }

    fn as_f64(self) -> f64 {
        self as f64
    }
}

impl Amount for f64 {
    fn exceeds(self, limit: Self) -> bool {
        self > limit + MIPS_TOLERANCE * limit.abs().max(1.)
    }

    fn as_f64(self) -> f64 {
        self
    }
}

#[derive(Clone, Debug)]
pub struct Provisioner<T: Amount> {
    capacity: T,
    allocated: T,
    allocations: FxHashMap<VmUid, T>,
}

pub type PeProvisioner = Provisioner<f64>;
pub type RamProvisioner = Provisioner<u64>;
pub type BwProvisioner = Provisioner<u64>;

impl<T: Amount> Provisioner<T> {
    pub fn new(capacity: T) -> Self {
        Self {
            capacity,
            allocated: T::default(),
            allocations: FxHashMap::default(),
        }
    }

    pub fn capacity(&self) -> T {
        self.capacity
    }

    pub fn allocated(&self) -> T {
        self.allocated
    }

    pub fn available(&self) -> T {
        if self.allocated >= self.capacity {
            T::default()
        } else {
            self.capacity - self.allocated
        }
    }

    pub fn allocated_for(&self, vm: VmUid) -> T {
        self.allocations.get(&vm).copied().unwrap_or_default()
    }

    pub fn is_suitable(&self, amount: T) -> bool {
        !amount.exceeds(self.available())
    }

    /// Adds `amount` to the share of `vm`. All-or-nothing: returns false and changes nothing
    /// if the amount does not fit.
    pub fn allocate(&mut self, vm: VmUid, amount: T) -> bool {
        if !self.is_suitable(amount) {
            return false;
        }
        *self.allocations.entry(vm).or_default() += amount;
        self.allocated += amount;
        true
    }

    /// Releases everything held by `vm` and returns the released amount.
    pub fn deallocate(&mut self, vm: VmUid) -> T {
        let amount = self.allocations.remove(&vm).unwrap_or_default();
        if self.allocations.is_empty() {
            self.allocated = T::default();
        } else {
            self.allocated -= amount;
        }
        amount
    }

    pub fn deallocate_all(&mut self) {
        self.allocations.clear();
        self.allocated = T::default();
    }

    pub fn verify(&self, resource: &'static str) -> Result<(), SimError> {
        if self.allocated.exceeds(self.capacity) {
            return Err(SimError::CapacityViolation {
                resource,
                requested: self.allocated.as_f64(),
                available: self.capacity.as_f64(),
            });
        }
        Ok(())
    }
}
