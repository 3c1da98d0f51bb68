use component_macros::{kafka_processor, Component};
use messaging_abstractions::{ConsumedMessage, KafkaProcessor};

#[derive(Debug, serde::Deserialize)]
struct Shipment {
    id: String,
}

#[derive(Debug, Default, Component)]
struct ShippingProcessor;

#[kafka_processor]
impl ShippingProcessor {
    #[kafka_consumer(topic = "shipments", group_id = "shipping")]
    async fn on_shipment(&self, shipment: Shipment) -> Result<(), String> {
        if shipment.id.is_empty() {
            return Err("empty id".to_string());
        }
        Ok(())
    }

    #[kafka_consumer(pattern = "^returns\\..+", group_id = "returns", from_beginning = true)]
    async fn on_return(
        &self,
        _payload: serde_json::Value,
        _message: ConsumedMessage,
    ) -> Result<(), std::io::Error> {
        Ok(())
    }
}

fn main() {
    assert_eq!(ShippingProcessor::consumer_methods().len(), 2);
    assert_eq!(
        ShippingProcessor::method_names(),
        vec!["on_shipment", "on_return"]
    );
}
