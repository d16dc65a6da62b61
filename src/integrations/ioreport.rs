//! Minimal bindings to the private IOReport framework

use core_foundation::base::{CFRelease, CFTypeRef, TCFType};
use core_foundation::string::CFString;
use core_foundation_sys::array::{CFArrayGetCount, CFArrayGetValueAtIndex, CFArrayRef};
use core_foundation_sys::base::kCFAllocatorDefault;
use core_foundation_sys::dictionary::{
    CFDictionaryCreateMutableCopy, CFDictionaryGetCount, CFDictionaryGetValue, CFDictionaryRef,
    CFMutableDictionaryRef,
};
use core_foundation_sys::string::CFStringRef;
use std::ffi::c_void;
use std::ptr;
use std::time::Instant;

use super::power::{EnergyChannel, EnergyRead};

type IOReportSubscriptionRef = *const c_void;

const ENERGY_GROUP: &str = "Energy Model";

#[link(name = "IOReport", kind = "dylib")]
extern "C" {
    fn IOReportCopyChannelsInGroup(
        group: CFStringRef,
        subgroup: CFStringRef,
        a: u64,
        b: u64,
        c: u64,
    ) -> CFDictionaryRef;

    fn IOReportCreateSubscription(
        a: *const c_void,
        desired: CFMutableDictionaryRef,
        subscribed: *mut CFMutableDictionaryRef,
        channel_id: u64,
        b: CFTypeRef,
    ) -> IOReportSubscriptionRef;

    fn IOReportCreateSamples(
        subscription: IOReportSubscriptionRef,
        channels: CFMutableDictionaryRef,
        a: CFTypeRef,
    ) -> CFDictionaryRef;

    fn IOReportCreateSamplesDelta(
        prev: CFDictionaryRef,
        current: CFDictionaryRef,
        a: CFTypeRef,
    ) -> CFDictionaryRef;

    fn IOReportChannelGetChannelName(channel: CFDictionaryRef) -> CFStringRef;
    fn IOReportChannelGetUnitLabel(channel: CFDictionaryRef) -> CFStringRef;
    fn IOReportSimpleGetIntegerValue(channel: CFDictionaryRef, a: i32) -> i64;
}

/// Subscription to the energy model plus the previous raw sample
pub struct EnergyReporter {
    subscription: IOReportSubscriptionRef,
    channels: CFMutableDictionaryRef,
    baseline: Option<(CFDictionaryRef, Instant)>,
}

// The CoreFoundation objects are owned exclusively by this value and only
// touched through `&mut self`.
unsafe impl Send for EnergyReporter {}

impl EnergyReporter {
    /// `None` when the channel group or the subscription is not available
    pub fn open() -> Option<Self> {
        let group = CFString::new(ENERGY_GROUP);

        unsafe {
            let found =
                IOReportCopyChannelsInGroup(group.as_concrete_TypeRef(), ptr::null(), 0, 0, 0);
            if found.is_null() {
                return None;
            }

            let count = CFDictionaryGetCount(found);
            let channels = CFDictionaryCreateMutableCopy(kCFAllocatorDefault, count, found);
            CFRelease(found as CFTypeRef);
            if channels.is_null() {
                return None;
            }

            let mut subscribed: CFMutableDictionaryRef = ptr::null_mut();
            let subscription =
                IOReportCreateSubscription(ptr::null(), channels, &mut subscribed, 0, ptr::null());
            if subscription.is_null() {
                CFRelease(channels as CFTypeRef);
                return None;
            }

            let mut reporter = Self {
                subscription,
                channels,
                baseline: None,
            };
            reporter.baseline = reporter.sample().map(|s| (s, Instant::now()));
            Some(reporter)
        }
    }

    fn sample(&self) -> Option<CFDictionaryRef> {
        let sample = unsafe { IOReportCreateSamples(self.subscription, self.channels, ptr::null()) };
        (!sample.is_null()).then_some(sample)
    }

    /// Energy consumed since the previous read. `None` when sampling failed.
    pub fn read(&mut self) -> Option<EnergyRead> {
        let current = self.sample()?;
        let now = Instant::now();

        let Some((previous, taken_at)) = self.baseline.replace((current, now)) else {
            return Some(EnergyRead::Primed);
        };

        unsafe {
            let delta = IOReportCreateSamplesDelta(previous, current, ptr::null());
            CFRelease(previous as CFTypeRef);
            if delta.is_null() {
                return None;
            }

            let channels = channels_of(delta);
            CFRelease(delta as CFTypeRef);

            Some(EnergyRead::Delta {
                channels,
                elapsed: now.duration_since(taken_at),
            })
        }
    }
}

impl Drop for EnergyReporter {
    fn drop(&mut self) {
        unsafe {
            if let Some((baseline, _)) = self.baseline.take() {
                CFRelease(baseline as CFTypeRef);
            }
            if !self.channels.is_null() {
                CFRelease(self.channels as CFTypeRef);
            }
        }
    }
}

unsafe fn cf_string(raw: CFStringRef) -> String {
    if raw.is_null() {
        return String::new();
    }
    CFString::wrap_under_get_rule(raw).to_string()
}

/// Flatten the `IOReportChannels` array of a delta sample
unsafe fn channels_of(delta: CFDictionaryRef) -> Vec<EnergyChannel> {
    let key = CFString::new("IOReportChannels");
    let items = CFDictionaryGetValue(delta, key.as_concrete_TypeRef() as *const c_void) as CFArrayRef;
    if items.is_null() {
        return Vec::new();
    }

    (0..CFArrayGetCount(items))
        .filter_map(|i| {
            let item = CFArrayGetValueAtIndex(items, i) as CFDictionaryRef;
            if item.is_null() {
                return None;
            }
            Some(EnergyChannel {
                name: cf_string(IOReportChannelGetChannelName(item)),
                unit: cf_string(IOReportChannelGetUnitLabel(item)),
                value: IOReportSimpleGetIntegerValue(item, 0),
            })
        })
        .collect()
}
