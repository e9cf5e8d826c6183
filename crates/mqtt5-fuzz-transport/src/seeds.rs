//! Starter corpus of well-formed broker-to-client frames.
//!
//! Most seeds come in two forms: the plain frame for fixed-mode runs and a
//! `dyn_` copy prefixed with the selector byte of the mode it is meant for.

use crate::error::Result;
use crate::mode::FuzzMode;
use crate::packet_builder::{RawPacketBuilder, PUBLISH_DUP, PUBLISH_RETAIN};
use std::fs;
use std::path::{Path, PathBuf};
use tracing::debug;

const QOS1: u8 = 0x02;
const QOS2: u8 = 0x04;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Seed {
    pub name: String,
    pub data: Vec<u8>,
}

#[derive(Debug, Clone, Default)]
pub struct SeedCorpus {
    seeds: Vec<Seed>,
}

impl SeedCorpus {
    /// Builds the full corpus.
    ///
    /// # Errors
    /// Returns `MalformedPacket` if a seed frame cannot be encoded.
    pub fn generate() -> Result<Self> {
        let mut corpus = Self::default();
        corpus.connacks();
        corpus.publishes()?;
        corpus.acks();
        corpus.subacks()?;
        corpus.misc()?;
        Ok(corpus)
    }

    #[must_use]
    pub fn seeds(&self) -> &[Seed] {
        &self.seeds
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.seeds.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.seeds.is_empty()
    }

    #[must_use]
    pub fn get(&self, name: &str) -> Option<&Seed> {
        self.seeds.iter().find(|seed| seed.name == name)
    }

    /// Creates `dir` if needed and writes one file per seed, returning the
    /// paths written.
    ///
    /// # Errors
    /// Returns `Io` if the directory or a file cannot be written.
    pub fn write_to_dir(&self, dir: impl AsRef<Path>) -> Result<Vec<PathBuf>> {
        let dir = dir.as_ref();
        fs::create_dir_all(dir)?;

        let mut written = Vec::with_capacity(self.seeds.len());
        for seed in &self.seeds {
            let path = dir.join(&seed.name);
            fs::write(&path, &seed.data)?;
            written.push(path);
        }
        debug!(count = written.len(), dir = %dir.display(), "Wrote seed corpus");
        Ok(written)
    }

    fn push(&mut self, name: impl Into<String>, data: Vec<u8>) {
        self.seeds.push(Seed {
            name: name.into(),
            data,
        });
    }

    fn push_with_dynamic(&mut self, mode: FuzzMode, name: &str, data: Vec<u8>) {
        if let Some(selector) = mode.selector() {
            let mut prefixed = Vec::with_capacity(data.len() + 1);
            prefixed.push(selector);
            prefixed.extend_from_slice(&data);
            self.push(format!("dyn_{name}"), prefixed);
        }
        self.push(name, data);
    }

    fn connacks(&mut self) {
        let hs = FuzzMode::Handshake;
        self.push_with_dynamic(hs, "connack_ok.bin", RawPacketBuilder::connack(false, 0));
        self.push_with_dynamic(
            hs,
            "connack_session_present.bin",
            RawPacketBuilder::connack(true, 0),
        );
        for (code, label) in [
            (1, "unacceptable_protocol"),
            (2, "identifier_rejected"),
            (3, "server_unavailable"),
            (4, "bad_username_password"),
            (5, "not_authorized"),
        ] {
            self.push_with_dynamic(
                hs,
                &format!("connack_refused_{label}.bin"),
                RawPacketBuilder::connack(false, code),
            );
        }

        let v5 = FuzzMode::Mqtt5;
        self.push_with_dynamic(v5, "v5_connack_ok.bin", RawPacketBuilder::connack_v5(false, 0));
        self.push_with_dynamic(
            v5,
            "v5_connack_session_present.bin",
            RawPacketBuilder::connack_v5(true, 0),
        );
        for (code, label) in [
            (0x81, "malformed_packet"),
            (0x8C, "unsupported_protocol"),
            (0x87, "not_authorized"),
        ] {
            self.push_with_dynamic(
                v5,
                &format!("v5_connack_refused_{label}.bin"),
                RawPacketBuilder::connack_v5(false, code),
            );
        }
    }

    fn publishes(&mut self) -> Result<()> {
        let conn = FuzzMode::Connected;
        let topic = "sensors/temperature";

        let small: [&[u8]; 4] = [b"", b"x", b"hello", br#"json:{"t":25.3}"#];
        for (i, payload) in small.into_iter().enumerate() {
            self.push_with_dynamic(
                conn,
                &format!("publish_qos0_small_{i}.bin"),
                RawPacketBuilder::publish_qos0(topic, payload)?,
            );
        }

        let variants: [(&str, u8, &[u8], Option<u16>); 8] = [
            ("publish_qos0_retain.bin", PUBLISH_RETAIN, b"retain", None),
            ("publish_qos0_dup.bin", PUBLISH_DUP, b"dup", None),
            ("publish_qos1_basic.bin", QOS1, b"ack-me", Some(1)),
            ("publish_qos1_dup.bin", QOS1 | PUBLISH_DUP, b"dup1", Some(0x1234)),
            ("publish_qos1_retain.bin", QOS1 | PUBLISH_RETAIN, b"keep", Some(2)),
            ("publish_qos2_basic.bin", QOS2, b"two-phase", Some(10)),
            ("publish_qos2_dup.bin", QOS2 | PUBLISH_DUP, b"dup2", Some(0xBEEF)),
            ("publish_qos2_retain.bin", QOS2 | PUBLISH_RETAIN, b"store", Some(11)),
        ];
        for (name, flags, payload, packet_id) in variants {
            self.push_with_dynamic(
                conn,
                name,
                RawPacketBuilder::publish_with_flags(flags, topic, payload, packet_id)?,
            );
        }

        // Remaining lengths straddling the one/two byte varint boundary.
        for rl in [127usize, 128, 129] {
            let payload = vec![0xAA; rl - 3];
            self.push_with_dynamic(
                conn,
                &format!("publish_qos0_rl{rl}.bin"),
                RawPacketBuilder::publish_qos0("t", &payload)?,
            );
        }
        for rl in [127usize, 128, 129] {
            let payload = vec![0x55; rl - 5];
            self.push_with_dynamic(
                conn,
                &format!("publish_qos1_rl{rl}.bin"),
                RawPacketBuilder::publish_qos1("t", &payload, 0x2222)?,
            );
        }

        let utf_topic = "s/温度/°C";
        self.push_with_dynamic(
            conn,
            "publish_utf8_topic_qos0.bin",
            RawPacketBuilder::publish_qos0(utf_topic, b"bytes")?,
        );
        self.push_with_dynamic(
            conn,
            "publish_utf8_topic_qos1.bin",
            RawPacketBuilder::publish_qos1(utf_topic, b"ack", 3)?,
        );

        let v5 = FuzzMode::Mqtt5;
        self.push_with_dynamic(
            v5,
            "v5_publish_qos0.bin",
            RawPacketBuilder::publish_v5(0, "v5/t", b"p0", None)?,
        );
        self.push_with_dynamic(
            v5,
            "v5_publish_qos1.bin",
            RawPacketBuilder::publish_v5(QOS1, "v5/t", b"p1", Some(1))?,
        );
        self.push_with_dynamic(
            v5,
            "v5_publish_qos2.bin",
            RawPacketBuilder::publish_v5(QOS2, "v5/t", b"p2", Some(2))?,
        );
        for rl in [127usize, 128, 129] {
            let payload = vec![0xCC; rl - 4];
            self.push_with_dynamic(
                v5,
                &format!("v5_publish_qos0_rl{rl}.bin"),
                RawPacketBuilder::publish_v5(0, "v", &payload, None)?,
            );
        }
        Ok(())
    }

    fn acks(&mut self) {
        let conn = FuzzMode::Connected;
        for (name, packet) in [
            ("puback_1.bin", RawPacketBuilder::puback(1)),
            ("pubrec_1.bin", RawPacketBuilder::pubrec(1)),
            ("pubrel_1.bin", RawPacketBuilder::pubrel(1)),
            ("pubcomp_1.bin", RawPacketBuilder::pubcomp(1)),
            ("puback_beef.bin", RawPacketBuilder::puback(0xBEEF)),
            ("pubcomp_cafe.bin", RawPacketBuilder::pubcomp(0xCAFE)),
        ] {
            self.push_with_dynamic(conn, name, packet);
        }

        let v5 = FuzzMode::Mqtt5;
        for (name, packet) in [
            ("v5_puback_min.bin", RawPacketBuilder::ack_v5(0x40, 1, false)),
            ("v5_puback_full.bin", RawPacketBuilder::ack_v5(0x40, 1, true)),
            ("v5_pubrec_min.bin", RawPacketBuilder::ack_v5(0x50, 2, false)),
            ("v5_pubrec_full.bin", RawPacketBuilder::ack_v5(0x50, 2, true)),
            ("v5_pubrel_min.bin", RawPacketBuilder::ack_v5(0x62, 3, false)),
            ("v5_pubcomp_min.bin", RawPacketBuilder::ack_v5(0x70, 4, false)),
        ] {
            self.push_with_dynamic(v5, name, packet);
        }
    }

    fn subacks(&mut self) -> Result<()> {
        let sub = FuzzMode::Subscribe;
        for (name, packet) in [
            ("suback_single_q0.bin", RawPacketBuilder::suback(1, &[0])?),
            ("suback_single_q1.bin", RawPacketBuilder::suback(2, &[1])?),
            ("suback_single_q2.bin", RawPacketBuilder::suback(3, &[2])?),
            ("suback_single_fail.bin", RawPacketBuilder::suback(4, &[0x80])?),
            ("suback_multi_mixed.bin", RawPacketBuilder::suback(5, &[0, 1, 2, 0x80])?),
        ] {
            self.push_with_dynamic(sub, name, packet);
        }

        let v5 = FuzzMode::Mqtt5;
        for (name, packet) in [
            ("v5_suback_q0.bin", RawPacketBuilder::suback_v5(11, &[0x00])?),
            ("v5_suback_q1.bin", RawPacketBuilder::suback_v5(12, &[0x01])?),
            ("v5_suback_q2.bin", RawPacketBuilder::suback_v5(13, &[0x02])?),
            ("v5_suback_fail.bin", RawPacketBuilder::suback_v5(14, &[0x80])?),
        ] {
            self.push_with_dynamic(v5, name, packet);
        }
        Ok(())
    }

    fn misc(&mut self) -> Result<()> {
        self.push("pingresp.bin", RawPacketBuilder::pingresp());

        let mut coalesced = RawPacketBuilder::connack(false, 0);
        coalesced.extend(RawPacketBuilder::publish_qos0("coalesced/topic", b"data")?);
        coalesced.extend(RawPacketBuilder::pingresp());
        self.push_with_dynamic(
            FuzzMode::Connected,
            "coalesced_connack_publish_pingresp.bin",
            coalesced,
        );
        Ok(())
    }
}
