//! Ordered accessor tables for every semantic listing field.
//!
//! Each field is an [`Accessor`]: a priority-ordered list of dot paths plus
//! one pure reader that turns the raw JSON value found at a path into the
//! field's type. The first path whose value the reader accepts wins.
//! Numeric path segments index into arrays (`photos.0.url`).

use serde_json::Value;

pub(crate) struct Accessor<T: 'static> {
    pub(crate) paths: &'static [&'static str],
    pub(crate) read: fn(&Value) -> Option<T>,
}

impl<T> Accessor<T> {
    pub(crate) fn first(&self, obj: &Value) -> Option<T> {
        self.paths
            .iter()
            .find_map(|path| lookup(obj, path).and_then(self.read))
    }

    /// `true` if any path resolves to a value the reader accepts.
    pub(crate) fn present(&self, obj: &Value) -> bool {
        self.first(obj).is_some()
    }
}

/// Resolve a dot path. `null` counts as absent.
pub(crate) fn lookup<'a>(root: &'a Value, path: &str) -> Option<&'a Value> {
    let mut current = root;
    for segment in path.split('.') {
        current = match current {
            Value::Object(map) => map.get(segment)?,
            Value::Array(items) => items.get(segment.parse::<usize>().ok()?)?,
            _ => return None,
        };
    }
    if current.is_null() {
        None
    } else {
        Some(current)
    }
}

pub(crate) const NAME: Accessor<String> = Accessor {
    paths: &["name", "restaurantName", "title", "displayName", "listingName"],
    read: read_text,
};

pub(crate) const IDENTITY: Accessor<String> = Accessor {
    paths: &[
        "rid",
        "restaurantId",
        "restaurant_id",
        "id",
        "listingId",
        "venueId",
        "legacyId",
        "objectId",
    ],
    read: read_id,
};

pub(crate) const SLUG: Accessor<String> = Accessor {
    paths: &[
        "slug",
        "urlSlug",
        "seoSlug",
        "profileSlug",
        "urls.slug",
        "nameSlug",
        "seo.slug",
        "handle",
    ],
    read: read_text,
};

pub(crate) const URL: Accessor<String> = Accessor {
    paths: &[
        "profileLink",
        "urls.profileLink.link",
        "urls.profileLink",
        "profileUrl",
        "restaurantUrl",
        "url",
        "link",
        "href",
        "canonicalUrl",
        "seo.canonicalUrl",
        "links.profile",
    ],
    read: read_text,
};

pub(crate) const IMAGE: Accessor<String> = Accessor {
    paths: &[
        "primaryPhoto.uri",
        "primaryPhoto.url",
        "photo",
        "photoUrl",
        "imageUrl",
        "image.url",
        "image.uri",
        "image",
        "thumbnailUrl",
        "thumbnail",
        "photos.0.url",
        "photos.0.uri",
    ],
    read: read_text,
};

pub(crate) const RATING: Accessor<f64> = Accessor {
    paths: &[
        "starRating",
        "rating",
        "overallRating",
        "averageRating",
        "reviewSummary.rating",
        "statistics.reviews.ratings.overall.rating",
        "ratings.overall",
        "aggregateRating.ratingValue",
        "rating.value",
    ],
    read: read_rating,
};

pub(crate) const REVIEW_COUNT: Accessor<u64> = Accessor {
    paths: &[
        "reviewCount",
        "numberOfReviews",
        "reviewsCount",
        "totalReviews",
        "reviewSummary.count",
        "statistics.reviews.allTimeTextReviewCount",
        "aggregateRating.reviewCount",
        "ratingCount",
        "reviews.count",
    ],
    read: read_count,
};

pub(crate) const CATEGORY: Accessor<String> = Accessor {
    paths: &[
        "cuisine.name",
        "primaryCuisine.name",
        "primaryCuisine",
        "cuisineType",
        "cuisine",
        "category.name",
        "category",
        "categories.0.name",
        "cuisines.0.name",
        "cuisines.0",
    ],
    read: read_text,
};

pub(crate) const PRICE_TIER: Accessor<String> = Accessor {
    paths: &[
        "priceBand.name",
        "priceBand.label",
        "priceBand",
        "priceRange",
        "priceTier",
        "priceLevel",
        "price",
    ],
    read: read_label,
};

pub(crate) const NEIGHBORHOOD: Accessor<String> = Accessor {
    paths: &[
        "neighborhood.name",
        "neighborhood",
        "neighborhoodName",
        "location.neighborhood.name",
        "location.neighborhood",
        "address.neighborhood",
    ],
    read: read_text,
};

pub(crate) const CITY: Accessor<String> = Accessor {
    paths: &[
        "city.name",
        "city",
        "location.city",
        "location.cityName",
        "address.city",
        "address.addressLocality",
    ],
    read: read_text,
};

pub(crate) const BOOKING_SLOTS: Accessor<Vec<Value>> = Accessor {
    paths: &[
        "availabilitySlots",
        "timeslots",
        "slots",
        "availability.timeslots",
        "availability.slots",
    ],
    read: read_array,
};

/// Sub-fields checked when an array element is a wrapper rather than a
/// listing itself.
pub(crate) const WRAPPER_FIELDS: [&str; 5] = ["node", "restaurant", "listing", "item", "result"];

fn read_text(value: &Value) -> Option<String> {
    value
        .as_str()
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
}

fn read_id(value: &Value) -> Option<String> {
    match value {
        Value::Number(n) => Some(n.to_string()),
        Value::String(_) => read_text(value),
        _ => None,
    }
}

fn read_label(value: &Value) -> Option<String> {
    match value {
        Value::Number(n) => Some(n.to_string()),
        _ => read_text(value),
    }
}

/// Ratings of zero mean "unrated" on every source seen so far.
fn read_rating(value: &Value) -> Option<f64> {
    let rating = match value {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.trim().parse::<f64>().ok(),
        _ => None,
    }?;
    (rating.is_finite() && rating > 0.0).then_some(rating)
}

// Float counts are truncated; the sign is checked first.
#[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
fn read_count(value: &Value) -> Option<u64> {
    match value {
        Value::Number(n) => n.as_u64().or_else(|| {
            n.as_f64()
                .filter(|f| f.is_finite() && *f >= 0.0)
                .map(|f| f as u64)
        }),
        Value::String(s) => s.trim().replace(',', "").parse::<u64>().ok(),
        _ => None,
    }
}

fn read_array(value: &Value) -> Option<Vec<Value>> {
    value.as_array().filter(|items| !items.is_empty()).cloned()
}
