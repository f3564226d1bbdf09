// Copyright (c) 2025 Ronan LE MEILLAT, SCTG Development
// This file is part of the hydrobridge project and is licensed under the
// SCTG Development Non-Commercial License v1.0 (see LICENSE.md for details).

//! In-process stand-in for the field controller
//!
//! Runs a Modbus TCP server backed by shared coil/register maps so tests can
//! seed control values, let the bridge run against it, and inspect what the
//! bridge wrote back. Missing addresses read as zero, like a freshly started
//! PLC. Raising `fail_reads` makes every read answer with a device-failure
//! exception, which is how tests simulate the endpoint dying mid-run.

use std::collections::HashMap;
use std::future;
use std::net::SocketAddr;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use tokio::net::TcpListener;
use tokio::task::JoinHandle;
use tokio::time;
use tokio_modbus::prelude::*;
use tokio_modbus::server::tcp::{accept_tcp_connection, Server};

use hydrobridge::registers::{decode_float, telemetry_address};

/// Shared register state of the emulated PLC.
#[derive(Clone, Default)]
pub struct PlcState {
    pub coils: Arc<Mutex<HashMap<u16, bool>>>,
    pub holding: Arc<Mutex<HashMap<u16, u16>>>,
    pub fail_reads: Arc<AtomicBool>,
}

impl PlcState {
    pub fn set_coil(&self, addr: u16, value: bool) {
        self.coils.lock().unwrap().insert(addr, value);
    }

    pub fn set_register(&self, addr: u16, value: u16) {
        self.holding.lock().unwrap().insert(addr, value);
    }

    pub fn register(&self, addr: u16) -> u16 {
        *self.holding.lock().unwrap().get(&addr).unwrap_or(&0)
    }

    /// Decode the float pair the bridge wrote at `base + 2 * slot`.
    pub fn float_at(&self, base: u16, slot: u16) -> f32 {
        let addr = telemetry_address(base, slot);
        decode_float([self.register(addr), self.register(addr + 1)])
    }
}

struct PlcService {
    state: PlcState,
}

impl tokio_modbus::server::Service for PlcService {
    type Request = Request<'static>;
    type Response = Response;
    type Exception = ExceptionCode;
    type Future = future::Ready<Result<Self::Response, Self::Exception>>;

    fn call(&self, req: Self::Request) -> Self::Future {
        let failing = self.state.fail_reads.load(Ordering::SeqCst);
        if failing && matches!(&req, Request::ReadCoils(..) | Request::ReadHoldingRegisters(..)) {
            return future::ready(Err(ExceptionCode::ServerDeviceFailure));
        }
        let res = match req {
            Request::ReadCoils(addr, cnt) => {
                let coils = self.state.coils.lock().unwrap();
                let bits = (0..cnt).map(|i| *coils.get(&(addr + i)).unwrap_or(&false)).collect();
                Ok(Response::ReadCoils(bits))
            }
            Request::ReadHoldingRegisters(addr, cnt) => {
                let registers = self.state.holding.lock().unwrap();
                let words = (0..cnt).map(|i| *registers.get(&(addr + i)).unwrap_or(&0)).collect();
                Ok(Response::ReadHoldingRegisters(words))
            }
            Request::WriteMultipleRegisters(addr, values) => {
                let mut registers = self.state.holding.lock().unwrap();
                for (i, value) in values.iter().enumerate() {
                    registers.insert(addr + i as u16, *value);
                }
                Ok(Response::WriteMultipleRegisters(addr, values.len() as u16))
            }
            Request::WriteSingleRegister(addr, value) => {
                self.state.holding.lock().unwrap().insert(addr, value);
                Ok(Response::WriteSingleRegister(addr, value))
            }
            _ => Err(ExceptionCode::IllegalFunction),
        };
        future::ready(res)
    }
}

/// A running PLC emulator.
pub struct PlcSim {
    pub addr: SocketAddr,
    pub state: PlcState,
    pub handle: JoinHandle<()>,
}

/// Start the emulator on an ephemeral local port.
pub async fn start_plc_sim() -> PlcSim {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let state = PlcState::default();
    let handle = spawn_plc(listener, state.clone());
    // Give the server a moment to start accepting.
    time::sleep(Duration::from_millis(50)).await;
    PlcSim {
        addr,
        state,
        handle,
    }
}

/// Serve the emulated PLC on an existing listener.
pub fn spawn_plc(listener: TcpListener, state: PlcState) -> JoinHandle<()> {
    tokio::spawn(async move {
        let server = Server::new(listener);
        let on_connected = move |stream, socket_addr| {
            let state = state.clone();
            async move {
                accept_tcp_connection(stream, socket_addr, move |_addr| {
                    Ok(Some(PlcService {
                        state: state.clone(),
                    }))
                })
            }
        };
        let on_process_error = |err| {
            eprintln!("plc sim error: {err}");
        };
        if let Err(e) = server.serve(&on_connected, on_process_error).await {
            eprintln!("plc sim terminated: {e}");
        }
    })
}
