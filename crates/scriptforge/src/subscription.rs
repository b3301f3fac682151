//! Subscription-tier lookup seam.
//!
//! The identity/billing side of the product is an external collaborator;
//! the pipeline only needs the per-tier limits and feature flags. A static
//! lookup ships as the default so the crate is usable without the billing
//! service wired in.

use serde::{Deserialize, Serialize};

use crate::error::SubscriptionError;

const MIB: u64 = 1024 * 1024;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Tier {
    Free,
    Creator,
    Studio,
}

/// Limits and feature flags bound to a subscription tier.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct TierLimits {
    pub max_monthly_jobs: u64,
    pub max_document_bytes: u64,
    pub max_video_bytes: u64,
    pub video_transcription: bool,
    pub variations: bool,
    pub trends: bool,
}

impl TierLimits {
    pub fn for_tier(tier: Tier) -> Self {
        match tier {
            Tier::Free => Self {
                max_monthly_jobs: 10,
                max_document_bytes: 5 * MIB,
                max_video_bytes: 5 * MIB,
                video_transcription: false,
                variations: false,
                trends: false,
            },
            Tier::Creator => Self {
                max_monthly_jobs: 100,
                max_document_bytes: 20 * MIB,
                max_video_bytes: 50 * MIB,
                video_transcription: true,
                variations: true,
                trends: false,
            },
            Tier::Studio => Self {
                max_monthly_jobs: 1000,
                max_document_bytes: 50 * MIB,
                max_video_bytes: 200 * MIB,
                video_transcription: true,
                variations: true,
                trends: true,
            },
        }
    }

    pub fn check_document_size(&self, size_bytes: u64) -> Result<(), SubscriptionError> {
        if size_bytes > self.max_document_bytes {
            return Err(SubscriptionError::PayloadTooLarge {
                kind: "document",
                size_bytes,
                limit_bytes: self.max_document_bytes,
            });
        }
        Ok(())
    }

    pub fn check_video_size(&self, size_bytes: u64) -> Result<(), SubscriptionError> {
        if size_bytes > self.max_video_bytes {
            return Err(SubscriptionError::PayloadTooLarge {
                kind: "video",
                size_bytes,
                limit_bytes: self.max_video_bytes,
            });
        }
        Ok(())
    }

    pub fn check_quota(&self, used_this_month: u64) -> Result<(), SubscriptionError> {
        if used_this_month >= self.max_monthly_jobs {
            return Err(SubscriptionError::QuotaExceeded {
                used: used_this_month,
                limit: self.max_monthly_jobs,
            });
        }
        Ok(())
    }

    pub fn require_transcription(&self) -> Result<(), SubscriptionError> {
        if !self.video_transcription {
            return Err(SubscriptionError::FeatureNotAvailable("video_transcription"));
        }
        Ok(())
    }
}

/// Owner-to-tier resolution, implemented by the identity service in
/// production and by fixtures in tests.
pub trait TierLookup: Send + Sync {
    fn limits_for(&self, owner_id: &str) -> TierLimits;
}

/// Lookup that hands every owner the same tier.
pub struct StaticTierLookup {
    limits: TierLimits,
}

impl StaticTierLookup {
    pub fn new(tier: Tier) -> Self {
        Self {
            limits: TierLimits::for_tier(tier),
        }
    }

    pub fn with_limits(limits: TierLimits) -> Self {
        Self { limits }
    }
}

impl TierLookup for StaticTierLookup {
    fn limits_for(&self, _owner_id: &str) -> TierLimits {
        self.limits
    }
}
