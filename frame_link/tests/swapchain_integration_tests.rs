//! Integration tests for the producer/consumer swapchain protocol
//!
//! These tests run both swapchain halves over a linked in-process transport
//! with CPU-backed contexts. No GPU required.
//!
//! Run with: cargo test --test swapchain_integration_tests


use std::sync::Arc;
use std::time::Duration;

use frame_link::framelink::context::{ContextExecutor, QueueExecutor};
use frame_link::framelink::swapchain::{
    BackendSwapchain, FrontendSwapchain, PresentMode, TransferMode,
};
use frame_link::framelink::transport::{CommandReceiver, LinkedTransport, Transport};
use frame_link::framelink::Error;
use serial_test::serial;
use swapchain_test_utils::{
    aliased_pair, current_pixels, isolated_pair, render_solid, solid_frame, test_config, TestLink,
};

// ============================================================================
// CONNECTION HANDSHAKE TESTS
// ============================================================================

#[test]
#[serial]
fn test_integration_swapchain_connection_handshake() {
    let (_store, producer, consumer) = aliased_pair();
    let config = test_config(2, PresentMode::Mailbox);

    // Step 1: Create the transport pair
    let (producer_end, consumer_end) = LinkedTransport::pair();
    let producer_end = Arc::new(producer_end);
    let consumer_end = Arc::new(consumer_end);

    // Step 2: Create the producer half and wire it to its endpoint
    let backend = BackendSwapchain::create(
        &producer,
        consumer.kind(),
        consumer.caps(),
        config.clone(),
        Arc::clone(&producer_end) as Arc<dyn Transport>,
    )
    .unwrap();
    producer_end.set_receiver(Arc::clone(&backend) as Arc<dyn CommandReceiver>);
    assert_eq!(backend.free_images(), 2, "Pool should start fully free");
    assert!(!backend.is_disposed());

    // Step 3: Connect the consumer half on its executor
    let executor = Arc::new(QueueExecutor::new());
    let (frontend, ready) = FrontendSwapchain::connect(
        backend.id(),
        config.present_mode,
        &consumer,
        Arc::clone(&executor) as Arc<dyn ContextExecutor>,
        Arc::clone(&consumer_end) as Arc<dyn Transport>,
    );
    consumer_end.set_receiver(Arc::clone(&frontend) as Arc<dyn CommandReceiver>);

    // Step 4: Nothing has run on the consumer thread yet
    assert!(!ready.is_complete());
    assert!(!backend.wait_frontend_ready(Duration::from_millis(10)));
    assert_eq!(executor.pending(), 1);

    // Step 5: Pump the consumer executor; the ack reaches the backend
    assert_eq!(executor.run_pending(), 1);
    assert!(ready.is_complete());
    assert!(
        backend.wait_frontend_ready(Duration::from_millis(100)),
        "AllocateAck should have been delivered"
    );

    // Step 6: No frame is displayable before the first present
    assert!(frontend.get_current_image().is_none());
}

// ============================================================================
// MAILBOX FRAME FLOW TESTS
// ============================================================================

#[test]
#[serial]
fn test_integration_alias_mailbox_frame_flow() {
    let (store, producer, consumer) = aliased_pair();
    let link = TestLink::connect(&producer, &consumer, test_config(3, PresentMode::Mailbox));
    assert_eq!(
        link.backend.transfer_mode(),
        TransferMode::TextureAlias,
        "Same-kind contexts with alias caps should negotiate aliasing"
    );

    // Render and present five frames, pumping the consumer each time
    let device = producer.device();
    for frame in 0u32..5 {
        let image = link.backend.acquire().unwrap();
        render_solid(&device, &image, 0xAA00_0000 + frame);
        link.backend.present(image).unwrap();
        link.pump();
    }

    // The consumer sees the newest frame through the producer's texture
    let size = link.backend.config().size;
    assert_eq!(current_pixels(&link, &store), solid_frame(0xAA00_0004, size));

    // Mailbox holds exactly the current frame; everything else was
    // superseded and released
    assert_eq!(link.backend.free_images(), 2);
}

#[test]
#[serial]
fn test_integration_mailbox_latest_frame_wins() {
    let (store, producer, consumer) = aliased_pair();
    let link = TestLink::connect(&producer, &consumer, test_config(2, PresentMode::Mailbox));
    let device = producer.device();

    // Two presents land before the consumer draws at all
    let first = link.backend.acquire().unwrap();
    render_solid(&device, &first, 0x1111_1111);
    link.backend.present(first).unwrap();

    let second = link.backend.acquire().unwrap();
    render_solid(&device, &second, 0x2222_2222);
    link.backend.present(second).unwrap();

    // One pump integrates both; only the newest survives
    link.pump();
    let size = link.backend.config().size;
    assert_eq!(current_pixels(&link, &store), solid_frame(0x2222_2222, size));
    assert_eq!(
        link.backend.free_images(),
        1,
        "The superseded frame should have been released"
    );

    // Reads are idempotent until the next present is integrated
    assert_eq!(current_pixels(&link, &store), solid_frame(0x2222_2222, size));
}

#[test]
#[serial]
fn test_integration_try_acquire_when_pool_exhausted() {
    let (_store, producer, consumer) = aliased_pair();
    let link = TestLink::connect(&producer, &consumer, test_config(2, PresentMode::Mailbox));
    let device = producer.device();

    let first = link.backend.try_acquire().unwrap();
    let second = link.backend.try_acquire().unwrap();
    assert!(first.is_some());
    assert!(second.is_some());
    assert!(
        link.backend.try_acquire().unwrap().is_none(),
        "Both images are owned, the producer skips this frame"
    );

    // Presenting only the first does not free anything: it becomes current
    let first = first.unwrap();
    render_solid(&device, &first, 0x3333_3333);
    link.backend.present(first).unwrap();
    link.pump();
    assert!(link.backend.try_acquire().unwrap().is_none());

    // The second present supersedes the first, which returns to the pool
    let second = second.unwrap();
    render_solid(&device, &second, 0x4444_4444);
    link.backend.present(second).unwrap();
    link.pump();
    assert!(link.backend.try_acquire().unwrap().is_some());
}

// ============================================================================
// FIFO FRAME FLOW TESTS
// ============================================================================

#[test]
#[serial]
fn test_integration_fifo_presents_display_in_order() {
    let (store, producer, consumer) = aliased_pair();
    let link = TestLink::connect(&producer, &consumer, test_config(3, PresentMode::Fifo));
    let device = producer.device();
    let size = link.backend.config().size;

    // Present two frames; both queue up on the consumer
    let image = link.backend.acquire().unwrap();
    render_solid(&device, &image, 0x1010_1010);
    link.backend.present(image).unwrap();
    link.pump();

    let image = link.backend.acquire().unwrap();
    render_solid(&device, &image, 0x2020_2020);
    link.backend.present(image).unwrap();
    link.pump();

    // Fifo keeps the oldest frame current until the host advances
    assert_eq!(current_pixels(&link, &store), solid_frame(0x1010_1010, size));
    assert_eq!(link.backend.free_images(), 1);

    // Advancing releases the drawn frame and surfaces the next one
    link.frontend.advance_frame();
    assert_eq!(current_pixels(&link, &store), solid_frame(0x2020_2020, size));
    assert_eq!(link.backend.free_images(), 2);

    // Advancing past the queue leaves nothing current
    link.frontend.advance_frame();
    assert!(link.frontend.get_current_image().is_none());
    assert_eq!(link.backend.free_images(), 3);
}

// ============================================================================
// MAIN-MEMORY FALLBACK TESTS
// ============================================================================

#[test]
#[serial]
fn test_integration_main_memory_fallback_flow() {
    let (producer_store, consumer_store, producer, consumer) = isolated_pair();
    let link = TestLink::connect(&producer, &consumer, test_config(2, PresentMode::Mailbox));
    assert_eq!(
        link.backend.transfer_mode(),
        TransferMode::MainMemory,
        "Different kinds with no shared handles should fall back to main memory"
    );

    let device = producer.device();
    let size = link.backend.config().size;

    // Step 1: First present; its readback has not been harvested yet, so
    // the consumer texture holds the initial (zero) host frame
    let image = link.backend.acquire().unwrap();
    render_solid(&device, &image, 0x0000_00F1);
    link.backend.present(image).unwrap();
    link.pump();
    assert_eq!(current_pixels(&link, &consumer_store), solid_frame(0, size));

    // Step 2: Second present goes to the other pool image
    let image = link.backend.acquire().unwrap();
    render_solid(&device, &image, 0x0000_00F2);
    link.backend.present(image).unwrap();
    link.pump();

    // Step 3: Third present reuses the first image and harvests its first
    // frame; the consumer now sees that image one present late
    let image = link.backend.acquire().unwrap();
    render_solid(&device, &image, 0x0000_00F3);
    link.backend.present(image).unwrap();
    link.pump();
    assert_eq!(
        current_pixels(&link, &consumer_store),
        solid_frame(0x0000_00F1, size),
        "Main-memory frames trail their present by one cycle of the image"
    );

    // Each pool image has a producer texture plus two transfer buffers and
    // one consumer-owned texture; nothing leaks across the stores
    assert_eq!(producer_store.texture_count(), 2);
    assert_eq!(producer_store.buffer_count(), 4);
    assert_eq!(consumer_store.texture_count(), 2);
    assert_eq!(consumer_store.buffer_count(), 0);
}

// ============================================================================
// DISPOSAL TESTS
// ============================================================================

#[test]
#[serial]
fn test_integration_frontend_dispose_releases_everything() {
    let (store, producer, consumer) = aliased_pair();
    let link = TestLink::connect(&producer, &consumer, test_config(2, PresentMode::Mailbox));
    let device = producer.device();

    // One frame is current on the consumer when disposal starts
    let image = link.backend.acquire().unwrap();
    render_solid(&device, &image, 0x5555_5555);
    link.backend.present(image).unwrap();
    link.pump();
    assert!(link.frontend.get_current_image().is_some());
    assert_eq!(store.texture_count(), 2);

    // Step 1: Dispose on the consumer side; the held frame is released
    // immediately, texture teardown waits for the consumer thread
    let done = link.frontend.dispose();
    assert!(link.frontend.is_disposed());
    assert!(link.frontend.get_current_image().is_none());
    assert!(!done.is_complete());
    assert!(!link.backend.is_disposed());
    assert_eq!(link.backend.free_images(), 2);

    // Step 2: The teardown job notifies the producer, which frees the pool
    link.pump();
    assert!(done.is_complete());
    assert!(link.backend.is_disposed());
    assert_eq!(store.texture_count(), 0);

    // Step 3: The producer can no longer acquire
    assert!(matches!(link.backend.acquire(), Err(Error::Disposed)));
    assert!(matches!(link.backend.try_acquire(), Err(Error::Disposed)));

    // Step 4: A second dispose is already complete
    let again = link.frontend.dispose();
    assert!(again.is_complete());
}

#[test]
#[serial]
fn test_integration_backend_dispose_after_drain_is_clean() {
    let (store, producer, consumer) = aliased_pair();
    let link = TestLink::connect(&producer, &consumer, test_config(2, PresentMode::Fifo));
    let device = producer.device();

    // Present one frame, draw it, give it back
    let image = link.backend.acquire().unwrap();
    render_solid(&device, &image, 0x6666_6666);
    link.backend.present(image).unwrap();
    link.pump();
    link.frontend.advance_frame();
    assert_eq!(link.backend.free_images(), 2);

    // With every image back in the pool, dispose reports no leaks and the
    // consumer half learns of the teardown synchronously
    link.backend.dispose().unwrap();
    assert!(link.backend.is_disposed());
    assert!(link.frontend.is_disposed());
    assert_eq!(store.texture_count(), 0);

    // The ack arrives once the consumer thread runs its teardown
    assert!(!link.backend.wait_dispose_ack(Duration::ZERO));
    link.pump();
    assert!(link.backend.wait_dispose_ack(Duration::from_millis(100)));
    assert!(link.frontend.get_current_image().is_none());

    // Disposing again stays clean
    link.backend.dispose().unwrap();
}

#[test]
#[serial]
fn test_integration_backend_dispose_reports_leaked_images() {
    let (store, producer, consumer) = aliased_pair();
    let link = TestLink::connect(&producer, &consumer, test_config(2, PresentMode::Mailbox));
    let device = producer.device();

    // The consumer holds a current frame and never gives it back; the
    // remote teardown drops it without a release
    let image = link.backend.acquire().unwrap();
    render_solid(&device, &image, 0x7777_7777);
    link.backend.present(image).unwrap();
    link.pump();

    // Dispose drains for its grace period, then reclaims and reports
    match link.backend.dispose() {
        Err(Error::InvalidResource(message)) => {
            assert!(
                message.contains("still owned"),
                "Leak report should name the unreturned images: {}",
                message
            );
        }
        other => panic!("Expected a leak report, got {:?}", other),
    }

    // Teardown still completed; the GPU resources are gone
    assert!(link.backend.is_disposed());
    assert_eq!(store.texture_count(), 0);
}

#[test]
#[serial]
fn test_integration_present_after_remote_dispose_fails() {
    let (_store, producer, consumer) = aliased_pair();
    let link = TestLink::connect(&producer, &consumer, test_config(2, PresentMode::Mailbox));
    let device = producer.device();

    // The producer is mid-frame when the consumer disposes
    let image = link.backend.acquire().unwrap();
    render_solid(&device, &image, 0x8888_8888);
    let done = link.frontend.dispose();
    link.pump();
    assert!(done.is_complete());
    assert!(link.backend.is_disposed());

    // The in-flight frame can no longer be presented
    assert!(matches!(link.backend.present(image), Err(Error::Disposed)));
}
