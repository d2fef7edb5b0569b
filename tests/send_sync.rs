//! Send/Sync guarantees for core types.

use logstash_hook::{
    Diagnostics, Hook, HookBuilder, LogRecord, LogstashFormatter, LogstashLogger, NetDialer,
    SharedFormatter,
};
use rstest::rstest;
use static_assertions::assert_impl_all;

#[rstest]
fn builders_are_send() {
    assert_impl_all!(HookBuilder: Send);
}

#[rstest]
fn components_are_send_sync() {
    assert_impl_all!(Hook: Send, Sync);
    assert_impl_all!(LogstashLogger: Send, Sync);
    assert_impl_all!(LogRecord: Send, Sync);
    assert_impl_all!(SharedFormatter: Send, Sync);
    assert_impl_all!(LogstashFormatter: Send, Sync);
    assert_impl_all!(NetDialer: Send, Sync);
    assert_impl_all!(Diagnostics: Send, Sync);
}
