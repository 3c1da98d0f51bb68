use component_macros::Component;
use infrastructure_common::Component;

#[derive(Debug, Component)]
struct LedgerService;

#[derive(Debug, Component)]
#[component(name = "generic-cache", priority = -1)]
struct Cache<T: std::fmt::Debug + Send + Sync + 'static> {
    value: T,
}

fn main() {
    assert_eq!(LedgerService.name(), "ledger-service");

    let cache = Cache { value: 1u8 };
    assert_eq!(cache.name(), "generic-cache");
    assert_eq!(cache.priority(), -1);
    assert_eq!(cache.value, 1);
}
