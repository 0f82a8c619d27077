use super::*;

#[test]
fn display_prefixes_are_stable() {
    assert!(
        RibaltaError::config("x")
            .to_string()
            .contains("config error:")
    );
    assert!(RibaltaError::usage("x").to_string().contains("usage error:"));
    assert!(
        RibaltaError::raster("x")
            .to_string()
            .contains("raster error:")
    );
    assert!(
        RibaltaError::serde("x")
            .to_string()
            .contains("serialization error:")
    );
}

#[test]
fn other_preserves_source() {
    let base = std::io::Error::other("boom");
    let err = RibaltaError::Other(anyhow::Error::new(base));
    assert!(err.to_string().contains("boom"));
}
