mod network_integration;
mod routing_table;
