//! Núcleo do console administrativo: permissões de sessão e o relógio
//! que avisa e encerra a sessão no fim do horário de acesso.

pub mod api;
pub mod common;
pub mod config;
pub mod middleware;
pub mod models;
pub mod services;
pub mod session;
