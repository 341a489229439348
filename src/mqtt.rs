use std::time::Duration;
use log::{error, info};
use rumqttc::{MqttOptions, AsyncClient, EventLoop, QoS, Event, Packet, Publish, LastWill};
use std::error::Error;

use crate::config_payload::GroupConfigPayload;
use crate::config_store::ConfigStore;
use crate::dispatcher;

pub struct MqttGroups<'a> {
    name: String,
    store: &'a mut ConfigStore,
    mqtt_client: AsyncClient,
    mqtt_events: EventLoop,
}

impl <'a> MqttGroups<'a> {
    pub fn new(store: &'a mut ConfigStore, name: &str, mqtt_broker: &str) -> MqttGroups<'a> {
        let mut mqtt_options = MqttOptions::new(name, mqtt_broker, 1883);
        let last_will = LastWill::new(MqttGroups::get_is_active_topic(name), "false".as_bytes(), QoS::AtLeastOnce, true);
        mqtt_options.set_keep_alive(Duration::from_secs(5)).set_last_will(last_will);

        let (mqtt_client, mqtt_events) = AsyncClient::new(mqtt_options, 10);

        MqttGroups {
            name: name.to_owned(),
            store,
            mqtt_client,
            mqtt_events,
        }
    }

    fn get_command_topic(name: &str) -> String {
        format!("Groups/Controllers/{}/Command", name)
    }

    fn get_status_topic(name: &str) -> String {
        format!("Groups/Status/{}", name)
    }

    fn get_config_topic(name: &str) -> String {
        format!("Groups/Config/{}", name)
    }

    fn get_is_active_topic(name: &str) -> String {
        format!("Groups/Active/{}", name)
    }

    async fn publish_config(client: &AsyncClient, config_topic: &str, store: &ConfigStore) -> Result<(), Box<dyn Error>> {
        let payload = GroupConfigPayload::from(store.groups());

        Ok(client.publish(config_topic, QoS::AtLeastOnce, true, serde_json::to_vec(&payload)?).await?)
    }

    pub async fn run(&mut self) -> Result<(), Box<dyn Error>> {
        let config_topic = &MqttGroups::get_config_topic(&self.name);
        let status_topic = &MqttGroups::get_status_topic(&self.name);
        let command_topic = &MqttGroups::get_command_topic(&self.name);

        self.mqtt_client.publish(MqttGroups::get_is_active_topic(&self.name), QoS::AtLeastOnce, true, "true".as_bytes()).await?;
        MqttGroups::publish_config(&self.mqtt_client, config_topic, self.store).await?;

        self.mqtt_client.subscribe(command_topic, QoS::AtLeastOnce).await?;
        info!("Waiting for commands on {}", command_topic);

        loop {
            let event = self.mqtt_events.poll().await?;

            if let Event::Incoming(Packet::Publish(Publish { ref topic, payload, ..})) = event {
                if topic == command_topic {
                    match std::str::from_utf8(payload.as_ref()) {
                        Ok(line) => {
                            let outcome = dispatcher::handle_line(self.store, line);

                            self.mqtt_client.publish(status_topic, QoS::AtMostOnce, false, outcome.reply.into_bytes()).await?;
                            if outcome.changed {
                                MqttGroups::publish_config(&self.mqtt_client, config_topic, self.store).await?;
                            }
                        },
                        Err(e) => error!("Invalid payload received on {}: {}", command_topic, e),
                    }
                }
                else {
                    error!("Got publish on unexpected topic {}", topic);
                }
            }
        }
    }
}
