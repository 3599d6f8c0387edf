//! Sponsorship platform adapters.

mod github_sponsors;

pub use github_sponsors::{
    validate_github_username, GithubSponsorsAdapter, SponsorshipPayload, SponsorshipTotals,
    GITHUB_GRAPHQL_URL, LOW_QUOTA_THRESHOLD,
};
