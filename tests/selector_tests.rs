// Model tier selection and fingerprint property tests
// Author: kelexine (https://github.com/kelexine)

use adforge::fingerprint::fingerprint;
use adforge::models::{ContentType, GenerationRequest, Tone};
use adforge::selector::{select_tier, ModelTier};
use proptest::prelude::*;

fn req(content_type: ContentType, duration: u32, variations: u32) -> GenerationRequest {
    GenerationRequest::new("Premium Coffee", Tone::Casual, duration, variations, content_type)
}

#[test]
fn test_tier_rules() {
    assert_eq!(select_tier(&req(ContentType::Tagline, 15, 2)), ModelTier::Fast);
    assert_eq!(select_tier(&req(ContentType::Script, 45, 1)), ModelTier::Capable);
    assert_eq!(select_tier(&req(ContentType::Tagline, 15, 4)), ModelTier::Capable);
    assert_eq!(select_tier(&req(ContentType::Tagline, 30, 1)), ModelTier::Capable);
    assert_eq!(select_tier(&req(ContentType::Script, 15, 1)), ModelTier::Capable);
    assert_eq!(
        select_tier(&req(ContentType::BrandStorytelling, 15, 1)),
        ModelTier::Capable
    );
}

#[test]
fn test_tier_uses_duration_bucket() {
    // 20s rounds down to the 15s bucket.
    assert_eq!(select_tier(&req(ContentType::Tagline, 20, 1)), ModelTier::Fast);
    // 23s rounds up to 30s.
    assert_eq!(select_tier(&req(ContentType::Tagline, 23, 1)), ModelTier::Capable);
}

#[test]
fn test_different_products_differ() {
    let a = req(ContentType::Tagline, 15, 2);
    let mut b = a.clone();
    b.product = "Premium Tea".to_string();
    assert_ne!(fingerprint(&a), fingerprint(&b));
}

fn tone() -> impl Strategy<Value = Tone> {
    prop::sample::select(Tone::ALL.to_vec())
}

fn content_type() -> impl Strategy<Value = ContentType> {
    prop::sample::select(vec![
        ContentType::Tagline,
        ContentType::ProductDescription,
        ContentType::Script,
        ContentType::MultiProduct,
        ContentType::BrandStorytelling,
    ])
}

proptest! {
    #[test]
    fn prop_fingerprint_ignores_case_and_padding(
        product in "[A-Za-z][A-Za-z ]{1,40}[A-Za-z]",
        tone in tone(),
        duration in 15u32..=60,
        variations in 1u32..=5,
        content_type in content_type(),
    ) {
        let a = GenerationRequest::new(product.clone(), tone, duration, variations, content_type);
        let b = GenerationRequest::new(
            format!("  {}  ", product.to_uppercase()),
            tone,
            duration,
            variations,
            content_type,
        );
        prop_assert_eq!(fingerprint(&a), fingerprint(&b));
    }

    #[test]
    fn prop_hint_order_does_not_matter(
        mut hints in prop::collection::vec("[a-z ]{1,20}", 0..6),
    ) {
        let base = GenerationRequest::new("Premium Coffee", Tone::Luxury, 30, 2, ContentType::Script);
        let a = base.clone().with_hints(hints.clone());
        hints.reverse();
        let b = base.with_hints(hints);
        prop_assert_eq!(fingerprint(&a), fingerprint(&b));
    }

    #[test]
    fn prop_tier_is_a_function_of_the_key(
        tone in tone(),
        duration in 15u32..=60,
        variations in 1u32..=5,
        content_type in content_type(),
    ) {
        let a = GenerationRequest::new("Premium Coffee", tone, duration, variations, content_type);
        let b = GenerationRequest::new("premium coffee", tone, a.duration_bucket(), variations, content_type);
        prop_assert_eq!(fingerprint(&a), fingerprint(&b));
        prop_assert_eq!(select_tier(&a), select_tier(&b));
    }
}
