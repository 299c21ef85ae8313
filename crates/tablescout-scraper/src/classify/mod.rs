//! Record classifier: decides whether an arbitrary JSON object is a listing
//! and reads normalized field values out of heterogeneous shapes.
//!
//! Everything here is pure. A field that cannot be resolved is `None`;
//! nothing in this module fails.

pub(crate) mod rules;
mod urls;

use serde_json::Value;

use tablescout_core::{ListingRecord, SiteProfile};

use rules::{
    BOOKING_SLOTS, CATEGORY, CITY, IDENTITY, IMAGE, NAME, NEIGHBORHOOD, PRICE_TIER, RATING,
    REVIEW_COUNT, SLUG, URL, WRAPPER_FIELDS,
};
use urls::{normalize_image_url, normalize_url, ImageRule};

/// Field accessors bound to one site's origin and image rules.
#[derive(Debug, Clone)]
pub struct Classifier {
    origin: String,
    profile_url_template: Option<String>,
    image: ImageRule,
}

impl Classifier {
    #[must_use]
    pub fn new(profile: &SiteProfile) -> Self {
        Self {
            origin: profile.origin.trim_end_matches('/').to_string(),
            profile_url_template: profile.profile_url_template.clone(),
            image: ImageRule {
                cdn_host_suffix: profile.image_cdn_host_suffix.clone(),
                canonical_template: profile.image_canonical_template.clone(),
                default_extension: profile.default_image_extension.clone(),
            },
        }
    }

    #[must_use]
    pub fn name(&self, obj: &Value) -> Option<String> {
        NAME.first(obj)
    }

    #[must_use]
    pub fn identity(&self, obj: &Value) -> Option<String> {
        IDENTITY.first(obj)
    }

    #[must_use]
    pub fn slug(&self, obj: &Value) -> Option<String> {
        SLUG.first(obj)
    }

    /// First alias whose value canonicalizes to an absolute URL.
    #[must_use]
    pub fn url(&self, obj: &Value) -> Option<String> {
        URL.paths
            .iter()
            .filter_map(|path| rules::lookup(obj, path).and_then(URL.read))
            .find_map(|raw| normalize_url(&raw, &self.origin))
    }

    #[must_use]
    pub fn image_url(&self, obj: &Value) -> Option<String> {
        IMAGE
            .paths
            .iter()
            .filter_map(|path| rules::lookup(obj, path).and_then(IMAGE.read))
            .find_map(|raw| normalize_image_url(&raw, &self.origin, &self.image))
    }

    #[must_use]
    pub fn rating(&self, obj: &Value) -> Option<f64> {
        RATING.first(obj)
    }

    #[must_use]
    pub fn review_count(&self, obj: &Value) -> Option<u64> {
        REVIEW_COUNT.first(obj)
    }

    #[must_use]
    pub fn category(&self, obj: &Value) -> Option<String> {
        CATEGORY.first(obj)
    }

    #[must_use]
    pub fn price_tier(&self, obj: &Value) -> Option<String> {
        PRICE_TIER.first(obj)
    }

    #[must_use]
    pub fn neighborhood(&self, obj: &Value) -> Option<String> {
        NEIGHBORHOOD.first(obj)
    }

    #[must_use]
    pub fn city(&self, obj: &Value) -> Option<String> {
        CITY.first(obj)
    }

    #[must_use]
    pub fn booking_slots(&self, obj: &Value) -> Vec<Value> {
        BOOKING_SLOTS.first(obj).unwrap_or_default()
    }

    /// Price tier, rating, review count or category present.
    #[must_use]
    pub fn has_listing_metadata(&self, obj: &Value) -> bool {
        PRICE_TIER.present(obj)
            || RATING.present(obj)
            || REVIEW_COUNT.present(obj)
            || CATEGORY.present(obj)
    }

    /// A listing has a name and either a resolvable URL or metadata.
    #[must_use]
    pub fn is_listing(&self, obj: &Value) -> bool {
        obj.is_object()
            && NAME.present(obj)
            && (self.url(obj).is_some() || self.has_listing_metadata(obj))
    }

    /// Lower bar used for reconciliation fragments: a name plus any one of
    /// url, rating, review count or image.
    #[must_use]
    pub fn is_detail_item(&self, obj: &Value) -> bool {
        obj.is_object()
            && NAME.present(obj)
            && (self.url(obj).is_some()
                || RATING.present(obj)
                || REVIEW_COUNT.present(obj)
                || self.image_url(obj).is_some())
    }

    /// The element itself when it is a listing, else the first wrapper
    /// sub-field (`node`, `restaurant`, ...) that is one. One level only.
    #[must_use]
    pub fn unwrap_listing<'a>(&self, element: &'a Value) -> Option<&'a Value> {
        if self.is_listing(element) {
            return Some(element);
        }
        WRAPPER_FIELDS
            .iter()
            .filter_map(|field| element.get(field))
            .find(|inner| self.is_listing(inner))
    }

    /// Read every field of `obj` into a record. No cross-source merging and
    /// no URL synthesis happen here.
    #[must_use]
    pub fn to_record(&self, obj: &Value) -> ListingRecord {
        ListingRecord {
            name: self.name(obj),
            identity: self.identity(obj),
            slug: self.slug(obj),
            url: self.url(obj),
            image_url: self.image_url(obj),
            rating: self.rating(obj),
            review_count: self.review_count(obj),
            category: self.category(obj),
            price_tier: self.price_tier(obj),
            neighborhood: self.neighborhood(obj),
            city: self.city(obj),
            booking_slots: self.booking_slots(obj),
        }
    }

    /// Profile URL built from an identity via the site's template.
    #[must_use]
    pub fn profile_url_for(&self, identity: &str) -> Option<String> {
        let template = self.profile_url_template.as_deref()?;
        normalize_url(&template.replace("{id}", identity), &self.origin)
    }
}
