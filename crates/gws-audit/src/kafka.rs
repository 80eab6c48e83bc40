// Copyright 2025-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

use std::time::Duration;

use rdkafka::client::ClientContext;
use rdkafka::config::ClientConfig;
use rdkafka::error::{KafkaError, RDKafkaErrorCode};
use rdkafka::message::Message;
use rdkafka::producer::{
    BaseRecord, DeliveryResult, Producer as _, ProducerContext, ThreadedProducer,
};
use rdkafka::util::Timeout;
use tokio::sync::mpsc;
use tracing::debug;

use crate::config::BrokerConfig;
use crate::errors::{PipelineError, ProduceError};
use crate::producer::{DeliveryReport, DeliveryReportReceiver, DeliveryReportSender, Producer};

/// Forwards librdkafka callbacks onto the delivery report channel.
///
/// Callbacks run on the producer's polling thread, so reports go through an unbounded
/// channel and never wait on the reader.
pub struct ReportingContext {
    reports: DeliveryReportSender,
}

impl ClientContext for ReportingContext {
    fn error(&self, error: KafkaError, reason: &str) {
        let _ = self.reports.send(DeliveryReport::ClientError {
            reason: format!("{error}: {reason}"),
        });
    }
}

impl ProducerContext for ReportingContext {
    type DeliveryOpaque = ();

    fn delivery(&self, delivery_result: &DeliveryResult<'_>, _: Self::DeliveryOpaque) {
        let report = match delivery_result {
            Ok(message) => DeliveryReport::Delivered {
                topic: message.topic().to_string(),
                partition: message.partition(),
                offset: message.offset(),
            },
            Err((error, message)) => DeliveryReport::Failed {
                topic: message.topic().to_string(),
                reason: error.to_string(),
            },
        };
        let _ = self.reports.send(report);
    }
}

pub struct KafkaProducer {
    producer: ThreadedProducer<ReportingContext>,
}

impl KafkaProducer {
    /// Creates the producer along with the receiving end of its delivery reports.
    pub fn new(config: &BrokerConfig) -> Result<(Self, DeliveryReportReceiver), PipelineError> {
        let (tx, rx) = mpsc::unbounded_channel();

        let mut client_config = ClientConfig::new();
        for (key, value) in config.client_properties() {
            client_config.set(key, value);
        }

        let producer = client_config
            .create_with_context(ReportingContext { reports: tx })
            .map_err(|e| PipelineError::Producer(e.to_string()))?;
        debug!("Kafka producer created for {}", config.servers);

        Ok((KafkaProducer { producer }, rx))
    }
}

impl Producer for KafkaProducer {
    fn produce(&self, topic: &str, payload: &[u8]) -> Result<(), ProduceError> {
        let record = BaseRecord::<(), [u8]>::to(topic).payload(payload);
        match self.producer.send(record) {
            Ok(()) => Ok(()),
            Err((KafkaError::MessageProduction(RDKafkaErrorCode::QueueFull), _)) => {
                Err(ProduceError::QueueFull)
            }
            Err((e, _)) => Err(ProduceError::Other(e.to_string())),
        }
    }

    fn flush(&self, timeout: Duration) -> Result<(), ProduceError> {
        self.producer
            .flush(Timeout::After(timeout))
            .map_err(|e| ProduceError::Other(e.to_string()))
    }
}
