use super::{Rule::*, RuleSet};
use crate::database::models::{PostStatus, TaxonomyKind};

const IMAGE_MIMES: &[&str] = &["jpeg", "png", "jpg", "gif", "svg"];
const IMAGE_MAX_KB: u64 = 2048;

pub const POST_CREATE: RuleSet = &[
    ("title", &[Required, String, Max(255)]),
    ("content", &[Required, String]),
    ("categories", &[Array, EachExists(TaxonomyKind::Category)]),
    ("tags", &[Array, EachExists(TaxonomyKind::Tag)]),
    ("featured_image", &[Nullable, Image, Mimes(IMAGE_MIMES), MaxKilobytes(IMAGE_MAX_KB)]),
    ("status", &[Required, In(PostStatus::NAMES)]),
];

pub const POST_UPDATE: RuleSet = &[
    ("title", &[Sometimes, String, Max(255)]),
    ("content", &[Sometimes, String]),
    ("categories", &[Sometimes, Array, EachExists(TaxonomyKind::Category)]),
    ("tags", &[Sometimes, Array, EachExists(TaxonomyKind::Tag)]),
    ("featured_image", &[Sometimes, Image, Mimes(IMAGE_MIMES), MaxKilobytes(IMAGE_MAX_KB)]),
    ("status", &[Sometimes, In(PostStatus::NAMES)]),
];

/// Categories and tags.
pub const TERM: RuleSet = &[("name", &[Required, String, Max(255)])];

pub const REGISTER: RuleSet = &[
    ("name", &[Required, String, Max(255)]),
    ("email", &[Required, String, Email, Max(255)]),
    ("password", &[Required, String, Min(8), Confirmed]),
];

pub const LOGIN: RuleSet = &[("email", &[Required, String, Email]), ("password", &[Required, String])];

pub const FORGOT_PASSWORD: RuleSet = &[("email", &[Required, Email])];

pub const RESET_PASSWORD: RuleSet = &[
    ("token", &[Required, String]),
    ("email", &[Required, Email]),
    ("password", &[Required, String, Min(8), Confirmed]),
];
