mod common;

use proptest::prelude::*;
use rstest::rstest;

use company_logo_cache::models::{LogoSettings, NO_LOGO_FINGERPRINT, fingerprint};
use company_logo_cache::services::logo_cache::{ImageReencoder, ReencodeConfig};
use company_logo_cache::utils::UrlUtils;

#[rstest]
#[case::file_name(Some("logo123"), None, Some(12345), "logo123-12345")]
#[case::file_name_wins(Some("a"), Some("/api/company-settings/logo/b"), Some(1), "a-1")]
#[case::from_url(None, Some("https://erp.example.com/api/company-settings/logo/xyz?v=2"), Some(7), "xyz-7")]
#[case::blank_name_uses_url(Some("  "), Some("/logo/q"), None, "q-0")]
#[case::missing_size(Some("f"), None, None, "f-0")]
#[case::no_identifier(None, Some("/assets/brand.png"), Some(3), "-3")]
fn test_fingerprint_cases(
    #[case] file_name: Option<&str>,
    #[case] url: Option<&str>,
    #[case] size: Option<u64>,
    #[case] expected: &str,
) {
    let settings = LogoSettings {
        has_logo: true,
        logo_file_name: file_name.map(str::to_string),
        logo_url: url.map(str::to_string),
        logo_size: size,
    };
    assert_eq!(fingerprint(&settings), expected);
}

#[rstest]
#[case("/api/company-settings/logo/logo123", Some("logo123"))]
#[case("http://host/api/company-settings/logo/abc#frag", Some("abc"))]
#[case("http://host/logo/", None)]
#[case("http://host/logos/abc", None)]
#[case("", None)]
fn test_logo_file_id_extraction(#[case] url: &str, #[case] expected: Option<&str>) {
    assert_eq!(UrlUtils::extract_logo_file_id(url).as_deref(), expected);
}

proptest! {
    #[test]
    fn test_fingerprint_depends_only_on_id_and_size(
        id in "[a-z0-9]{1,12}",
        size in proptest::option::of(0u64..10_000_000),
        url_a in proptest::option::of("[ -~]{0,40}"),
        url_b in proptest::option::of("[ -~]{0,40}"),
    ) {
        let a = LogoSettings {
            has_logo: true,
            logo_file_name: Some(id.clone()),
            logo_url: url_a,
            logo_size: size,
        };
        let b = LogoSettings {
            logo_url: url_b,
            ..a.clone()
        };

        prop_assert_eq!(fingerprint(&a), fingerprint(&a));
        prop_assert_eq!(fingerprint(&a), fingerprint(&b));
        prop_assert_eq!(fingerprint(&a), format!("{}-{}", id, size.unwrap_or(0)));
    }

    #[test]
    fn test_no_logo_is_always_the_sentinel(
        name in proptest::option::of("[a-z]{0,8}"),
        size in proptest::option::of(any::<u64>()),
    ) {
        let settings = LogoSettings {
            has_logo: false,
            logo_file_name: name,
            logo_url: None,
            logo_size: size,
        };
        prop_assert_eq!(fingerprint(&settings), NO_LOGO_FINGERPRINT);
    }
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(12))]

    #[test]
    fn test_reencoded_width_is_bounded(width in 801u32..1600, height in 1u32..400) {
        let reencoder = ImageReencoder::new(ReencodeConfig::default());
        let image = reencoder
            .reencode(&common::png(width, height), "image/png")
            .unwrap();
        prop_assert!(image.is_jpeg());

        let decoded = image::load_from_memory(&image.decode_bytes().unwrap()).unwrap();
        prop_assert_eq!(decoded.width(), 800);

        let expected_height = height as f64 * 800.0 / width as f64;
        prop_assert!((decoded.height() as f64 - expected_height).abs() <= 1.0);
    }
}
