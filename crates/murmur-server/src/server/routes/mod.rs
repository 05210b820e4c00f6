// Route modules for Murmur Server
pub mod websocket; // Relay WebSocket endpoint
