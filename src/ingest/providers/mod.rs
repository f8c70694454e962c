pub mod oslo_bors;
