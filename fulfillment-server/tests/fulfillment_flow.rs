//! End-to-end pipeline tests against in-memory SQLite with fake collaborators

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use fulfillment_server::db::DbService;
use fulfillment_server::db::repository::{order as order_repo, product as product_repo, voucher as voucher_repo};
use fulfillment_server::fulfillment::{FulfillmentRunner, PipelineContext, collect, process_pending_orders};
use fulfillment_server::marketplace::{MarketplaceError, OrderSource};
use fulfillment_server::messaging::Notifier;
use parking_lot::Mutex;
use shared::models::{OrderCreate, OrderStatus, ProductCreate, VoucherCreate, VoucherKind};
use tokio_util::sync::CancellationToken;

#[derive(Default)]
struct FakeSource {
    orders: Mutex<Vec<OrderCreate>>,
    dispatched: Mutex<Vec<String>>,
    reject_dispatch: AtomicBool,
    /// Listing answers with an upstream error
    unavailable: AtomicBool,
}

#[async_trait]
impl OrderSource for FakeSource {
    async fn fetch_recent_orders(&self) -> Result<Vec<OrderCreate>, MarketplaceError> {
        if self.unavailable.load(Ordering::SeqCst) {
            return Err(MarketplaceError::Status {
                status: 503,
                body: "maintenance".into(),
            });
        }
        Ok(self.orders.lock().clone())
    }

    async fn mark_dispatched(&self, order_number: &str) -> bool {
        if self.reject_dispatch.load(Ordering::SeqCst) {
            return false;
        }
        self.dispatched.lock().push(order_number.to_string());
        true
    }
}

#[derive(Default)]
struct FakeNotifier {
    texts: Mutex<Vec<(String, String)>>,
    images: Mutex<Vec<(String, String, usize)>>,
    fail_text: AtomicBool,
    fail_image: AtomicBool,
    /// Image sends wait for `release` while set
    hold_images: AtomicBool,
    /// Signalled when a held image send starts waiting
    holding: tokio::sync::Notify,
    release: tokio::sync::Notify,
}

impl FakeNotifier {
    fn fail_all(&self) {
        self.fail_text.store(true, Ordering::SeqCst);
        self.fail_image.store(true, Ordering::SeqCst);
    }
}

#[async_trait]
impl Notifier for FakeNotifier {
    async fn send_text(&self, phone: &str, message: &str) -> bool {
        // Let concurrent runs interleave at the gateway call
        tokio::task::yield_now().await;
        if self.fail_text.load(Ordering::SeqCst) {
            return false;
        }
        self.texts.lock().push((phone.to_string(), message.to_string()));
        true
    }

    async fn send_image(&self, phone: &str, message: &str, image: &[u8]) -> bool {
        if self.hold_images.load(Ordering::SeqCst) {
            self.holding.notify_one();
            self.release.notified().await;
        }
        if self.fail_image.load(Ordering::SeqCst) {
            return false;
        }
        self.images
            .lock()
            .push((phone.to_string(), message.to_string(), image.len()));
        true
    }
}

struct Harness {
    ctx: PipelineContext,
    source: Arc<FakeSource>,
    notifier: Arc<FakeNotifier>,
}

impl Harness {
    async fn new() -> Self {
        Self::on(DbService::in_memory().await.unwrap())
    }

    fn on(db: DbService) -> Self {
        let source = Arc::new(FakeSource::default());
        let notifier = Arc::new(FakeNotifier::default());
        let ctx = PipelineContext {
            pool: db.pool,
            source: source.clone(),
            notifier: notifier.clone(),
            store_name: "Gift Shop".into(),
        };
        Self {
            ctx,
            source,
            notifier,
        }
    }

    async fn product(&self, name: &str, items: &[VoucherCreate]) -> i64 {
        let product = product_repo::create(
            &self.ctx.pool,
            ProductCreate {
                name: name.into(),
                category: None,
                price: 10_000,
                description: None,
            },
        )
        .await
        .unwrap();
        voucher_repo::insert_many(&self.ctx.pool, product.id, items)
            .await
            .unwrap();
        product.id
    }

    fn upstream(&self, number: &str, product: &str, quantity: i64) {
        self.source.orders.lock().push(OrderCreate {
            order_number: number.into(),
            product_name: product.into(),
            customer_name: "Hong".into(),
            customer_phone: "010-1234-5678".into(),
            quantity,
            unit_price: 10_000,
            ordered_at: None,
        });
    }

    async fn run(&self) -> fulfillment_server::fulfillment::ProcessOutcome {
        process_pending_orders(&self.ctx, &CancellationToken::new()).await
    }
}

fn codes(list: &[&str]) -> Vec<VoucherCreate> {
    list.iter().map(|c| VoucherCreate::code(*c)).collect()
}

fn png_file(dir: &std::path::Path, name: &str) -> VoucherCreate {
    let mut png = Vec::new();
    image::DynamicImage::new_rgb8(8, 8)
        .write_to(&mut std::io::Cursor::new(&mut png), image::ImageFormat::Png)
        .unwrap();
    let path = dir.join(name);
    std::fs::write(&path, &png).unwrap();
    VoucherCreate {
        payload: path.to_string_lossy().into_owned(),
        kind: VoucherKind::Image,
        description: Some("Gold card".into()),
    }
}

#[tokio::test]
async fn test_single_order_end_to_end() {
    let h = Harness::new().await;
    let product_id = h
        .product(
            "Culture Voucher",
            &codes(&["AAAA-1111-0001", "BBBB-2222-0002", "CCCC-3333-0003"]),
        )
        .await;
    h.upstream("O-100", "Culture Voucher", 2);

    let collected = collect(&h.ctx).await;
    assert!(collected.success);
    assert_eq!(collected.new_orders, 1);

    let outcome = h.run().await;
    assert_eq!(outcome.processed, 1);
    assert_eq!(outcome.completed, 1);
    assert_eq!(outcome.reconciled, 1);

    let texts = h.notifier.texts.lock().clone();
    assert_eq!(texts.len(), 1);
    assert_eq!(texts[0].0, "010-1234-5678");
    assert!(texts[0].1.contains("AAAA-1111-0001"));
    assert!(texts[0].1.contains("BBBB-2222-0002"));
    assert!(!texts[0].1.contains("CCCC-3333-0003"));
    assert!(h.notifier.images.lock().is_empty());

    let vouchers = voucher_repo::find_by_product(&h.ctx.pool, product_id)
        .await
        .unwrap();
    let used: Vec<_> = vouchers.iter().filter(|v| v.used).collect();
    assert_eq!(used.len(), 2);
    assert!(used.iter().all(|v| v.order_ref.as_deref() == Some("O-100")));
    assert_eq!(used[0].payload, "AAAA-1111-0001");
    assert_eq!(used[1].payload, "BBBB-2222-0002");
    assert!(vouchers[2].is_available());

    let order = order_repo::find_by_number(&h.ctx.pool, "O-100")
        .await
        .unwrap()
        .unwrap();
    assert_eq!(order.status, OrderStatus::Completed);
    assert!(order.reconciled);
    assert_eq!(h.source.dispatched.lock().clone(), vec!["O-100".to_string()]);

    // Same upstream list again: nothing new, nothing left to process
    assert_eq!(collect(&h.ctx).await.new_orders, 0);
    assert_eq!(h.run().await.processed, 0);
    assert_eq!(h.notifier.texts.lock().len(), 1);
}

#[tokio::test]
async fn test_insufficient_inventory_allocates_nothing() {
    let h = Harness::new().await;
    let product_id = h
        .product("Movie Ticket", &codes(&["MOVI-1111-0001", "MOVI-2222-0002"]))
        .await;
    h.upstream("O-200", "Movie Ticket", 3);
    collect(&h.ctx).await;

    let outcome = h.run().await;
    assert_eq!(outcome.failed, 1);

    let order = order_repo::find_by_number(&h.ctx.pool, "O-200")
        .await
        .unwrap()
        .unwrap();
    assert_eq!(order.status, OrderStatus::Error);
    assert!(
        order
            .notes
            .as_deref()
            .unwrap()
            .contains("insufficient inventory")
    );
    let vouchers = voucher_repo::find_by_product(&h.ctx.pool, product_id)
        .await
        .unwrap();
    assert!(vouchers.iter().all(|v| v.is_available()));
    assert!(h.notifier.texts.lock().is_empty());
    assert!(h.source.dispatched.lock().is_empty());
}

#[tokio::test]
async fn test_image_vouchers_preferred() {
    let h = Harness::new().await;
    let dir = tempfile::tempdir().unwrap();
    let mut items = codes(&["CODE-1111-0001", "CODE-2222-0002", "CODE-3333-0003"]);
    items.push(png_file(dir.path(), "one.png"));
    items.push(png_file(dir.path(), "two.png"));
    let product_id = h.product("Cafe Gift", &items).await;
    h.upstream("O-300", "Cafe Gift", 2);
    collect(&h.ctx).await;

    assert_eq!(h.run().await.completed, 1);

    let used: Vec<_> = voucher_repo::find_by_order(&h.ctx.pool, "O-300")
        .await
        .unwrap();
    assert_eq!(used.len(), 2);
    assert!(used.iter().all(|v| v.kind == VoucherKind::Image));
    assert!(
        voucher_repo::find_by_product(&h.ctx.pool, product_id)
            .await
            .unwrap()
            .iter()
            .filter(|v| v.kind == VoucherKind::Code)
            .all(|v| v.is_available())
    );

    // Images only: no text message, one image message each
    assert!(h.notifier.texts.lock().is_empty());
    let images = h.notifier.images.lock().clone();
    assert_eq!(images.len(), 2);
    assert!(images.iter().all(|(_, caption, size)| caption.contains("O-300") && *size > 0));
}

#[tokio::test]
async fn test_failed_notification_releases_vouchers() {
    let h = Harness::new().await;
    let product_id = h
        .product("Book Card", &codes(&["BOOK-1111-0001", "BOOK-2222-0002"]))
        .await;
    h.upstream("O-400", "Book Card", 1);
    collect(&h.ctx).await;
    h.notifier.fail_all();

    let outcome = h.run().await;
    assert_eq!(outcome.failed, 1);

    let order = order_repo::find_by_number(&h.ctx.pool, "O-400")
        .await
        .unwrap()
        .unwrap();
    assert_eq!(order.status, OrderStatus::Error);
    assert_eq!(order.notes.as_deref(), Some("notification failed"));
    assert!(
        voucher_repo::find_by_product(&h.ctx.pool, product_id)
            .await
            .unwrap()
            .iter()
            .all(|v| v.is_available())
    );
}

#[tokio::test]
async fn test_orders_never_share_vouchers() {
    let h = Harness::new().await;
    let product_id = h
        .product(
            "Game Card",
            &codes(&["GAME-1111-0001", "GAME-2222-0002", "GAME-3333-0003"]),
        )
        .await;
    h.upstream("O-501", "Game Card", 2);
    h.upstream("O-502", "Game Card", 2);
    collect(&h.ctx).await;

    let outcome = h.run().await;
    assert_eq!(outcome.processed, 2);
    assert_eq!(outcome.completed, 1);
    assert_eq!(outcome.failed, 1);

    let first = order_repo::find_by_number(&h.ctx.pool, "O-501")
        .await
        .unwrap()
        .unwrap();
    let second = order_repo::find_by_number(&h.ctx.pool, "O-502")
        .await
        .unwrap()
        .unwrap();
    assert_eq!(first.status, OrderStatus::Completed);
    assert_eq!(second.status, OrderStatus::Error);

    let vouchers = voucher_repo::find_by_product(&h.ctx.pool, product_id)
        .await
        .unwrap();
    assert_eq!(vouchers.iter().filter(|v| v.used).count(), 2);
    assert!(
        vouchers
            .iter()
            .filter(|v| v.used)
            .all(|v| v.order_ref.as_deref() == Some("O-501"))
    );
}

#[tokio::test]
async fn test_partially_allocated_order_gets_only_the_remainder() {
    let h = Harness::new().await;
    let product_id = h
        .product(
            "Music Pass",
            &codes(&["MUSI-1111-0001", "MUSI-2222-0002", "MUSI-3333-0003"]),
        )
        .await;
    h.upstream("O-600", "Music Pass", 2);
    collect(&h.ctx).await;

    // One voucher was already handed to this order by an earlier run
    let first = voucher_repo::find_by_product(&h.ctx.pool, product_id)
        .await
        .unwrap()
        .remove(0);
    let mut conn = h.ctx.pool.acquire().await.unwrap();
    assert!(
        voucher_repo::allocate(&mut conn, &first, "O-600", "Hong", "010-1234-5678")
            .await
            .unwrap()
    );
    drop(conn);

    assert_eq!(h.run().await.completed, 1);

    let allocated = voucher_repo::find_by_order(&h.ctx.pool, "O-600")
        .await
        .unwrap();
    assert_eq!(allocated.len(), 2);
    let texts = h.notifier.texts.lock().clone();
    assert_eq!(texts.len(), 1);
    assert!(!texts[0].1.contains("MUSI-1111-0001"));
    assert!(texts[0].1.contains("MUSI-2222-0002"));
}

#[tokio::test]
async fn test_fully_allocated_order_completes_without_sending() {
    let h = Harness::new().await;
    let product_id = h.product("Taxi Credit", &codes(&["TAXI-1111-0001"])).await;
    h.upstream("O-650", "Taxi Credit", 1);
    collect(&h.ctx).await;

    let id = voucher_repo::find_by_product(&h.ctx.pool, product_id)
        .await
        .unwrap()
        .remove(0);
    let mut conn = h.ctx.pool.acquire().await.unwrap();
    voucher_repo::allocate(&mut conn, &id, "O-650", "Hong", "010-1234-5678")
        .await
        .unwrap();
    drop(conn);

    assert_eq!(h.run().await.completed, 1);
    assert!(h.notifier.texts.lock().is_empty());
    let order = order_repo::find_by_number(&h.ctx.pool, "O-650")
        .await
        .unwrap()
        .unwrap();
    assert_eq!(order.status, OrderStatus::Completed);
}

#[tokio::test]
async fn test_error_orders_wait_for_reset() {
    let h = Harness::new().await;
    let product_id = h.product("Pizza Coupon", &codes(&["PIZZ-1111-0001"])).await;
    h.upstream("O-700", "Pizza Coupon", 2);
    collect(&h.ctx).await;
    assert_eq!(h.run().await.failed, 1);

    // Restocking alone does not retry the order
    voucher_repo::insert_many(&h.ctx.pool, product_id, &codes(&["PIZZ-2222-0002"]))
        .await
        .unwrap();
    assert_eq!(h.run().await.processed, 0);

    let order = order_repo::reset(&h.ctx.pool, "O-700").await.unwrap();
    assert_eq!(order.status, OrderStatus::Pending);
    assert!(order.notes.is_none());

    assert_eq!(h.run().await.completed, 1);
    assert!(order_repo::reset(&h.ctx.pool, "O-700").await.is_err());
}

#[tokio::test]
async fn test_missing_phone_and_unknown_product_fail() {
    let h = Harness::new().await;
    h.product("Coffee", &codes(&["COFF-1111-0001"])).await;
    h.upstream("O-801", "Flowers", 1);
    h.source.orders.lock().push(OrderCreate {
        order_number: "O-802".into(),
        product_name: "Coffee".into(),
        customer_name: "Hong".into(),
        customer_phone: " - ".into(),
        quantity: 1,
        unit_price: 4_500,
        ordered_at: None,
    });
    collect(&h.ctx).await;

    assert_eq!(h.run().await.failed, 2);
    let unknown = order_repo::find_by_number(&h.ctx.pool, "O-801")
        .await
        .unwrap()
        .unwrap();
    assert_eq!(unknown.notes.as_deref(), Some("product not found: Flowers"));
    let no_phone = order_repo::find_by_number(&h.ctx.pool, "O-802")
        .await
        .unwrap()
        .unwrap();
    assert_eq!(no_phone.notes.as_deref(), Some("missing customer phone"));
}

#[tokio::test]
async fn test_unacknowledged_dispatch_is_retried() {
    let h = Harness::new().await;
    h.product("Bakery", &codes(&["BAKE-1111-0001"])).await;
    h.upstream("O-900", "Bakery", 1);
    h.source.reject_dispatch.store(true, Ordering::SeqCst);

    let runner = Arc::new(FulfillmentRunner::new(h.ctx.clone()));
    let cycle = runner.trigger_collection().await.unwrap();
    assert_eq!(cycle.collect.new_orders, 1);
    assert_eq!(cycle.process.completed, 1);
    assert_eq!(cycle.process.reconciled, 0);

    let order = order_repo::find_by_number(&h.ctx.pool, "O-900")
        .await
        .unwrap()
        .unwrap();
    assert_eq!(order.status, OrderStatus::Completed);
    assert!(!order.reconciled);

    h.source.reject_dispatch.store(false, Ordering::SeqCst);
    let outcome = runner.trigger_processing().await.unwrap();
    assert_eq!(outcome.processed, 0);
    assert_eq!(outcome.reconciled, 1);
    assert_eq!(h.source.dispatched.lock().clone(), vec!["O-900".to_string()]);

    let status = runner.status();
    assert_eq!(status.total_collected, 1);
    assert_eq!(status.total_completed, 1);
}

#[tokio::test]
async fn test_unavailable_marketplace_collects_nothing() {
    let h = Harness::new().await;
    h.upstream("O-1100", "Anything", 1);
    h.source.unavailable.store(true, Ordering::SeqCst);

    let outcome = collect(&h.ctx).await;
    assert!(!outcome.success);
    assert_eq!(outcome.new_orders, 0);
    assert!(outcome.message.contains("503"));
    assert!(
        order_repo::find_by_number(&h.ctx.pool, "O-1100")
            .await
            .unwrap()
            .is_none()
    );

    // Recovers on the next cycle
    h.source.unavailable.store(false, Ordering::SeqCst);
    assert_eq!(collect(&h.ctx).await.new_orders, 1);
}

#[tokio::test]
async fn test_partial_delivery_still_completes() {
    let h = Harness::new().await;
    let dir = tempfile::tempdir().unwrap();
    let mut items = codes(&["SPLT-1111-0001"]);
    items.push(png_file(dir.path(), "card.png"));
    let product_id = h.product("Split Pack", &items).await;
    h.upstream("O-1200", "Split Pack", 2);
    collect(&h.ctx).await;
    h.notifier.fail_image.store(true, Ordering::SeqCst);

    let outcome = h.run().await;
    assert_eq!(outcome.completed, 1);
    assert_eq!(outcome.failed, 0);

    // The text went out, the image did not, both vouchers stay committed
    assert_eq!(h.notifier.texts.lock().len(), 1);
    assert!(h.notifier.images.lock().is_empty());
    let allocated = voucher_repo::find_by_order(&h.ctx.pool, "O-1200")
        .await
        .unwrap();
    assert_eq!(allocated.len(), 2);
    assert!(allocated.iter().all(|v| v.used && v.product_id == product_id));

    let order = order_repo::find_by_number(&h.ctx.pool, "O-1200")
        .await
        .unwrap()
        .unwrap();
    assert_eq!(order.status, OrderStatus::Completed);
}

#[tokio::test]
async fn test_interleaved_runs_never_allocate_twice() {
    let h = Harness::new().await;
    let product_id = h
        .product(
            "Race Card",
            &codes(&["RACE-1111-0001", "RACE-2222-0002", "RACE-3333-0003"]),
        )
        .await;
    for number in ["O-1301", "O-1302", "O-1303", "O-1304"] {
        h.upstream(number, "Race Card", 1);
    }
    collect(&h.ctx).await;

    let never = CancellationToken::new();
    let (first, second) = tokio::join!(
        process_pending_orders(&h.ctx, &never),
        process_pending_orders(&h.ctx, &never)
    );
    assert!(first.completed + second.completed >= 1);

    let mut completed = 0;
    for number in ["O-1301", "O-1302", "O-1303", "O-1304"] {
        let order = order_repo::find_by_number(&h.ctx.pool, number)
            .await
            .unwrap()
            .unwrap();
        let allocated = voucher_repo::find_by_order(&h.ctx.pool, number)
            .await
            .unwrap();
        if order.status == OrderStatus::Completed {
            completed += 1;
            assert_eq!(allocated.len(), 1, "{number} holds exactly its quantity");
        } else {
            assert!(allocated.is_empty(), "{number} is not completed but holds vouchers");
        }
    }
    assert!(completed <= 3);

    let used = voucher_repo::find_by_product(&h.ctx.pool, product_id)
        .await
        .unwrap()
        .into_iter()
        .filter(|v| v.used)
        .count();
    assert_eq!(used, completed);
}

#[tokio::test]
async fn test_abandoned_trigger_still_finishes_the_order() {
    let h = Harness::new().await;
    let dir = tempfile::tempdir().unwrap();
    let mut items = codes(&["SECR-1234-0001", "OTHR-9887-0002"]);
    items.push(png_file(dir.path(), "card.png"));
    h.product("Secret Card", &items).await;
    h.upstream("O-1401", "Secret Card", 2);
    collect(&h.ctx).await;
    h.notifier.hold_images.store(true, Ordering::SeqCst);

    let runner = Arc::new(FulfillmentRunner::new(h.ctx.clone()));

    // The caller gives up while the image send is still in flight
    let abandoned =
        tokio::time::timeout(Duration::from_millis(200), runner.trigger_processing()).await;
    assert!(abandoned.is_err());
    assert_eq!(h.notifier.texts.lock().len(), 1);
    assert!(runner.status().running);
    assert!(runner.trigger_processing().await.is_err());

    h.notifier.release.notify_one();
    tokio::time::timeout(Duration::from_secs(5), async {
        while runner.status().running {
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
    })
    .await
    .unwrap();

    let order = order_repo::find_by_number(&h.ctx.pool, "O-1401")
        .await
        .unwrap()
        .unwrap();
    assert_eq!(order.status, OrderStatus::Completed);
    let allocated = voucher_repo::find_by_order(&h.ctx.pool, "O-1401")
        .await
        .unwrap();
    assert_eq!(allocated.len(), 2);
    assert!(allocated.iter().any(|v| v.payload == "SECR-1234-0001"));

    // The next order gets the remaining code, never the one already sent
    h.notifier.hold_images.store(false, Ordering::SeqCst);
    h.upstream("O-1402", "Secret Card", 1);
    collect(&h.ctx).await;
    assert_eq!(runner.trigger_processing().await.unwrap().completed, 1);

    let texts = h.notifier.texts.lock().clone();
    assert_eq!(texts.len(), 2);
    assert!(texts[1].1.contains("OTHR-9887-0002"));
    assert_eq!(
        texts
            .iter()
            .filter(|(_, msg)| msg.contains("SECR-1234-0001"))
            .count(),
        1
    );
    assert!(!runner.status().running);
}

#[tokio::test]
async fn test_seller_writes_proceed_during_delivery() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("fulfillment.db");
    let h = Harness::on(DbService::new(&path.to_string_lossy()).await.unwrap());
    let product_id = h
        .product("Slow Card", &[png_file(dir.path(), "slow.png")])
        .await;
    h.upstream("O-1500", "Slow Card", 1);
    collect(&h.ctx).await;
    h.notifier.hold_images.store(true, Ordering::SeqCst);

    let ctx = h.ctx.clone();
    let run = tokio::spawn(async move { process_pending_orders(&ctx, &CancellationToken::new()).await });
    h.notifier.holding.notified().await;

    // Inventory stays writable while the gateway call is in flight
    let added = tokio::time::timeout(
        Duration::from_secs(2),
        voucher_repo::insert_many(&h.ctx.pool, product_id, &codes(&["LATE-1111-0001"])),
    )
    .await
    .unwrap()
    .unwrap();
    assert_eq!(added, 1);

    h.notifier.release.notify_one();
    assert_eq!(run.await.unwrap().completed, 1);
    let allocated = voucher_repo::find_by_order(&h.ctx.pool, "O-1500")
        .await
        .unwrap();
    assert_eq!(allocated.len(), 1);
    assert_eq!(allocated[0].kind, VoucherKind::Image);
}
