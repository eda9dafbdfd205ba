//! Customer message composition

/// Text message carrying every code and link voucher of one delivery
///
/// `image_count` image vouchers are announced; they follow as separate
/// image messages.
pub fn compose_text(
    store_name: &str,
    customer_name: &str,
    product_name: &str,
    codes: &[&str],
    links: &[&str],
    image_count: usize,
) -> String {
    let mut msg = format!("[{store_name}] {customer_name}, here is your {product_name} order.\n");

    if !codes.is_empty() {
        msg.push_str("\nVoucher codes:\n");
        for (i, code) in codes.iter().enumerate() {
            msg.push_str(&format!("{}. {code}\n", i + 1));
        }
    }

    for link in links {
        msg.push_str(&format!("\n{link}\n"));
    }

    if image_count > 0 {
        msg.push_str(&format!(
            "\n{image_count} gift card image(s) follow in separate messages.\n"
        ));
    }

    msg.push_str("\nThank you for your purchase.");
    msg
}

/// Caption for one image voucher
pub fn compose_image_caption(
    store_name: &str,
    customer_name: &str,
    product_name: &str,
    description: Option<&str>,
    order_number: &str,
) -> String {
    let description = description.unwrap_or("Gift card image");
    format!("[{store_name}] {customer_name}\n{product_name} - {description}\nOrder: {order_number}")
}
