use super::*;
use crate::context::mock_context::MockDevice;

fn test_image() -> (Arc<MockDevice>, AliasImage) {
    let device = Arc::new(MockDevice::new());
    let image = AliasImage::new(
        Arc::clone(&device) as Arc<dyn GpuDevice>,
        ImageId::new(0),
        UVec2::new(64, 32),
        PixelFormat::Rgba8,
    );
    (device, image)
}

// ============================================================================
// Allocation Tests
// ============================================================================

#[test]
fn test_alias_allocate_creates_texture() {
    let (device, mut image) = test_image();
    image.allocate().unwrap();
    assert_eq!(device.texture_count(), 1);
}

#[test]
fn test_alias_allocate_failure_propagates() {
    let (device, mut image) = test_image();
    device.fail_next_allocation();

    assert!(matches!(image.allocate(), Err(Error::OutOfMemory)));
    assert_eq!(device.texture_count(), 0);
}

#[test]
fn test_alias_data_before_allocate_fails() {
    let (_device, image) = test_image();
    assert!(matches!(image.data(), Err(Error::InvalidResource(_))));
}

#[test]
fn test_alias_data_carries_texture_handle() {
    let (_device, mut image) = test_image();
    image.allocate().unwrap();

    let data = image.data().unwrap();
    assert_eq!(data.id, ImageId::new(0));
    assert_eq!(data.size, UVec2::new(64, 32));
    assert_eq!(data.format, PixelFormat::Rgba8);
    assert!(matches!(data.handle, ImageHandle::Texture { .. }));
}

#[test]
fn test_alias_render_target_is_the_shared_texture() {
    let (_device, mut image) = test_image();
    assert!(image.render_target().is_err());
    image.allocate().unwrap();

    let target = image.render_target().unwrap();
    match image.data().unwrap().handle {
        ImageHandle::Texture { name } => assert_eq!(name, target),
        other => panic!("Expected a texture handle, got {:?}", other),
    }
}

// ============================================================================
// Lifecycle Hook Tests
// ============================================================================

#[test]
fn test_alias_on_acquire_is_a_no_op() {
    let (device, mut image) = test_image();
    image.allocate().unwrap();
    let ops_before = device.ops().len();

    image.on_acquire().unwrap();
    assert_eq!(device.ops().len(), ops_before);
}

#[test]
fn test_alias_on_present_flushes_device() {
    let (device, mut image) = test_image();
    image.allocate().unwrap();

    image.on_present().unwrap();
    assert!(device.ops().iter().any(|op| op == "flush"));
}

// ============================================================================
// Release Tests
// ============================================================================

#[test]
fn test_alias_release_destroys_texture() {
    let (device, mut image) = test_image();
    image.allocate().unwrap();
    image.release();

    assert_eq!(device.texture_count(), 0);
    assert!(image.data().is_err());
}

#[test]
fn test_alias_release_without_allocate_is_harmless() {
    let (device, mut image) = test_image();
    image.release();
    image.release();
    assert_eq!(device.texture_count(), 0);
}
