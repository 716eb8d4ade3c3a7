//! Utilities for reasoning about credential lifetimes
//!
//! Credentials issued by the remote platform carry an absolute expiry in
//! Unix seconds. The types here keep those instants and durations apart,
//! and allow the current time to be mocked out in tests through the
//! [`Clock`] trait.

#![warn(
    missing_docs,
    unused_import_braces,
    unused_imports,
    unused_qualifications
)]
#![deny(
    missing_debug_implementations,
    missing_copy_implementations,
    trivial_casts,
    trivial_numeric_casts,
    unused_must_use
)]
#![forbid(unsafe_code)]
#![cfg_attr(docsrs, feature(doc_cfg))]

use std::{
    fmt, ops,
    sync::{
        atomic::{AtomicU64, Ordering},
        Arc,
    },
    time::{Duration, SystemTime},
};

#[cfg(feature = "serde")]
use serde::{Deserialize, Deserializer, Serialize, Serializer};

/// Unix time
///
/// Unix time as represented by the number of seconds elapsed since the
/// beginning of the Unix epoch on 1970/01/01 at 00:00:00 UTC.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Ord, PartialOrd, Hash)]
#[repr(transparent)]
pub struct UnixTime(pub u64);

/// A span of time measured in whole seconds
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Ord, PartialOrd, Hash)]
#[repr(transparent)]
pub struct DurationSecs(pub u64);

impl From<SystemTime> for UnixTime {
    #[inline]
    fn from(t: SystemTime) -> Self {
        // Times before the epoch read as the epoch.
        let time = t
            .duration_since(SystemTime::UNIX_EPOCH)
            .map(|d| d.as_secs())
            .unwrap_or(0);

        UnixTime(time)
    }
}

impl fmt::Display for UnixTime {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        fmt::Display::fmt(&self.0, f)
    }
}

impl fmt::Display for DurationSecs {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{}s", self.0)
    }
}

impl From<DurationSecs> for Duration {
    #[inline]
    fn from(d: DurationSecs) -> Self {
        Duration::from_secs(d.0)
    }
}

impl ops::Add<DurationSecs> for UnixTime {
    type Output = UnixTime;

    #[inline]
    fn add(self, rhs: DurationSecs) -> Self::Output {
        UnixTime(self.0.saturating_add(rhs.0))
    }
}

impl ops::Sub<DurationSecs> for UnixTime {
    type Output = UnixTime;

    #[inline]
    fn sub(self, rhs: DurationSecs) -> Self::Output {
        UnixTime(self.0.saturating_sub(rhs.0))
    }
}

impl ops::Sub<UnixTime> for UnixTime {
    type Output = DurationSecs;

    /// Elapsed seconds between two instants, saturating at zero
    #[inline]
    fn sub(self, rhs: UnixTime) -> Self::Output {
        DurationSecs(self.0.saturating_sub(rhs.0))
    }
}

impl ops::Add for DurationSecs {
    type Output = DurationSecs;

    #[inline]
    fn add(self, rhs: DurationSecs) -> Self::Output {
        DurationSecs(self.0.saturating_add(rhs.0))
    }
}

impl ops::Sub for DurationSecs {
    type Output = DurationSecs;

    #[inline]
    fn sub(self, rhs: DurationSecs) -> Self::Output {
        DurationSecs(self.0.saturating_sub(rhs.0))
    }
}

#[cfg(any(feature = "serde", doc))]
#[cfg_attr(docsrs, doc(cfg(feature = "serde")))]
impl Serialize for UnixTime {
    #[inline]
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        self.0.serialize(serializer)
    }
}

#[cfg(any(feature = "serde", doc))]
#[cfg_attr(docsrs, doc(cfg(feature = "serde")))]
impl<'de> Deserialize<'de> for UnixTime {
    #[inline]
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = u64::deserialize(deserializer)?;
        Ok(Self(s))
    }
}

#[cfg(any(feature = "serde", doc))]
#[cfg_attr(docsrs, doc(cfg(feature = "serde")))]
impl Serialize for DurationSecs {
    #[inline]
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        self.0.serialize(serializer)
    }
}

#[cfg(any(feature = "serde", doc))]
#[cfg_attr(docsrs, doc(cfg(feature = "serde")))]
impl<'de> Deserialize<'de> for DurationSecs {
    #[inline]
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = u64::deserialize(deserializer)?;
        Ok(Self(s))
    }
}

/// Represents a clock, which can tell the current time
pub trait Clock {
    /// Gets the current time according to this clock
    fn now(&self) -> UnixTime;
}

impl<C: Clock + ?Sized> Clock for &C {
    #[inline]
    fn now(&self) -> UnixTime {
        (**self).now()
    }
}

impl<C: Clock + ?Sized> Clock for Arc<C> {
    #[inline]
    fn now(&self) -> UnixTime {
        (**self).now()
    }
}

/// The system clock as provided by `std::time::SystemTime`
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct System;

impl Clock for System {
    #[inline]
    fn now(&self) -> UnixTime {
        UnixTime::from(SystemTime::now())
    }
}

/// A manually driven clock
///
/// Clones share the same underlying instant, so a test can hand one clone
/// to a component under test and advance time from the outside.
#[derive(Clone, Debug, Default)]
pub struct ManualClock {
    now: Arc<AtomicU64>,
}

impl ManualClock {
    /// Creates a new clock stopped at `time`
    pub fn new(time: UnixTime) -> Self {
        Self {
            now: Arc::new(AtomicU64::new(time.0)),
        }
    }

    /// Moves the clock to `time`
    pub fn set(&self, time: UnixTime) {
        self.now.store(time.0, Ordering::SeqCst);
    }

    /// Advances the clock by `by`
    pub fn advance(&self, by: DurationSecs) {
        self.now.fetch_add(by.0, Ordering::SeqCst);
    }
}

impl Clock for ManualClock {
    #[inline]
    fn now(&self) -> UnixTime {
        UnixTime(self.now.load(Ordering::SeqCst))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn instant_arithmetic_saturates() {
        assert_eq!(UnixTime(10) - UnixTime(20), DurationSecs(0));
        assert_eq!(UnixTime(5) - DurationSecs(10), UnixTime(0));
        assert_eq!(UnixTime(u64::MAX) + DurationSecs(1), UnixTime(u64::MAX));
        assert_eq!(UnixTime(100) - UnixTime(40), DurationSecs(60));
    }

    #[test]
    fn manual_clock_clones_share_time() {
        let clock = ManualClock::new(UnixTime(1_000));
        let observer = clock.clone();

        clock.advance(DurationSecs(30));
        assert_eq!(observer.now(), UnixTime(1_030));

        observer.set(UnixTime(5));
        assert_eq!(clock.now(), UnixTime(5));
    }

    #[test]
    fn pre_epoch_system_time_reads_as_epoch() {
        let before = SystemTime::UNIX_EPOCH - Duration::from_secs(60);
        assert_eq!(UnixTime::from(before), UnixTime(0));
    }

    #[cfg(feature = "serde")]
    #[test]
    fn serializes_as_bare_seconds() {
        let json = serde_json::to_string(&UnixTime(1_700_000_000)).unwrap();
        assert_eq!(json, "1700000000");
        let back: DurationSecs = serde_json::from_str("7200").unwrap();
        assert_eq!(back, DurationSecs(7200));
    }
}
