use uuid::Uuid;

/// Generic Access (0x1800)
pub const GENERIC_ACCESS: Uuid = Uuid::from_u128(0x0000_1800_0000_1000_8000_0080_5f9b_34fb);
/// Generic Attribute (0x1801)
pub const GENERIC_ATTRIBUTE: Uuid = Uuid::from_u128(0x0000_1801_0000_1000_8000_0080_5f9b_34fb);
/// Device Information (0x180A)
pub const DEVICE_INFORMATION: Uuid = Uuid::from_u128(0x0000_180a_0000_1000_8000_0080_5f9b_34fb);
/// Serial Port Profile (0x1101)
pub const SERIAL_PORT: Uuid = Uuid::from_u128(0x0000_1101_0000_1000_8000_0080_5f9b_34fb);

/// Printer service used by most generic ESC/POS BLE printers (0x18F0)
pub const PRINTER_18F0_SERVICE: Uuid = Uuid::from_u128(0x0000_18f0_0000_1000_8000_0080_5f9b_34fb);
/// Write characteristic of the 0x18F0 service (0x2AF1)
pub const PRINTER_18F0_WRITE: Uuid = Uuid::from_u128(0x0000_2af1_0000_1000_8000_0080_5f9b_34fb);

/// Vendor printer service found on many portable receipt printers
pub const VENDOR_PRINT_SERVICE: Uuid = Uuid::from_u128(0xe781_0a71_73ae_499d_8c15_faa9_aef0_c3f2);
/// Write characteristic of the vendor printer service
pub const VENDOR_PRINT_WRITE: Uuid = Uuid::from_u128(0xbef8_d6c9_9c21_4c9e_b632_bd58_c100_9f9f);

/// ISSC/Microchip transparent UART service
pub const ISSC_UART_SERVICE: Uuid = Uuid::from_u128(0x4953_5343_fe7d_4ae5_8fa9_9faf_d205_e455);
/// ISSC transparent UART RX (host to device) characteristic
pub const ISSC_UART_WRITE: Uuid = Uuid::from_u128(0x4953_5343_8841_43f4_a8d4_ecbe_3472_9bb3);

/// HM-10 style UART service (0xFFE0)
pub const HM10_UART_SERVICE: Uuid = Uuid::from_u128(0x0000_ffe0_0000_1000_8000_0080_5f9b_34fb);
/// HM-10 style UART data characteristic (0xFFE1)
pub const HM10_UART_DATA: Uuid = Uuid::from_u128(0x0000_ffe1_0000_1000_8000_0080_5f9b_34fb);

/// Generic 0xFF00 printer service
pub const FF00_SERVICE: Uuid = Uuid::from_u128(0x0000_ff00_0000_1000_8000_0080_5f9b_34fb);
/// Write characteristic of the 0xFF00 service (0xFF02)
pub const FF00_WRITE: Uuid = Uuid::from_u128(0x0000_ff02_0000_1000_8000_0080_5f9b_34fb);

/// Service used by small "cat" thermal printers (0xAE30)
pub const AE30_SERVICE: Uuid = Uuid::from_u128(0x0000_ae30_0000_1000_8000_0080_5f9b_34fb);
/// Write characteristic of the 0xAE30 service (0xAE01)
pub const AE30_WRITE: Uuid = Uuid::from_u128(0x0000_ae01_0000_1000_8000_0080_5f9b_34fb);

/// Nordic UART Service
pub const NORDIC_UART_SERVICE: Uuid = Uuid::from_u128(0x6e40_0001_b5a3_f393_e0a9_e50e_24dc_ca9e);
/// Nordic UART RX (host to device) characteristic
pub const NORDIC_UART_RX: Uuid = Uuid::from_u128(0x6e40_0002_b5a3_f393_e0a9_e50e_24dc_ca9e);

/// Lookup tables driving discovery and negotiation
///
/// Records which services and characteristics have been seen carrying print
/// data, so negotiation can try them before an exhaustive search.
///
/// The three lists are independent: adding a service to the chooser
/// allow-list does not change negotiation order, and vice versa.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServiceCatalog {
    optional_services: Vec<Uuid>,
    priority_services: Vec<Uuid>,
    fast_path_characteristics: Vec<Uuid>,
}

impl ServiceCatalog {
    /// Create a catalog from explicit tables
    #[must_use]
    pub const fn new(
        optional_services: Vec<Uuid>,
        priority_services: Vec<Uuid>,
        fast_path_characteristics: Vec<Uuid>,
    ) -> Self {
        Self {
            optional_services,
            priority_services,
            fast_path_characteristics,
        }
    }

    /// Services requested from the device chooser
    #[must_use]
    pub fn optional_services(&self) -> &[Uuid] {
        &self.optional_services
    }

    /// Services tried first during negotiation, best first
    #[must_use]
    pub fn priority_services(&self) -> &[Uuid] {
        &self.priority_services
    }

    /// Characteristics tried directly before the exhaustive search
    #[must_use]
    pub fn fast_path_characteristics(&self) -> &[Uuid] {
        &self.fast_path_characteristics
    }

    /// Add a service to the chooser allow-list
    pub fn allow_service(&mut self, uuid: Uuid) -> &mut Self {
        if !self.optional_services.contains(&uuid) {
            self.optional_services.push(uuid);
        }
        self
    }

    /// Add a service to the end of the priority list (and the allow-list)
    pub fn prefer_service(&mut self, uuid: Uuid) -> &mut Self {
        if !self.priority_services.contains(&uuid) {
            self.priority_services.push(uuid);
        }
        self.allow_service(uuid)
    }

    /// Add a characteristic to the fast path
    pub fn prefer_characteristic(&mut self, uuid: Uuid) -> &mut Self {
        if !self.fast_path_characteristics.contains(&uuid) {
            self.fast_path_characteristics.push(uuid);
        }
        self
    }

    /// Position of a service in the priority list
    #[must_use]
    pub fn priority_of(&self, service: Uuid) -> Option<usize> {
        self.priority_services.iter().position(|s| *s == service)
    }

    /// Whether a service appears in the chooser allow-list
    #[must_use]
    pub fn is_allowed(&self, service: Uuid) -> bool {
        self.optional_services.contains(&service)
    }
}

impl Default for ServiceCatalog {
    fn default() -> Self {
        let priority_services = vec![
            PRINTER_18F0_SERVICE,
            VENDOR_PRINT_SERVICE,
            ISSC_UART_SERVICE,
            HM10_UART_SERVICE,
            FF00_SERVICE,
            AE30_SERVICE,
            NORDIC_UART_SERVICE,
        ];

        let mut optional_services = vec![
            GENERIC_ACCESS,
            GENERIC_ATTRIBUTE,
            DEVICE_INFORMATION,
            SERIAL_PORT,
        ];
        optional_services.extend_from_slice(&priority_services);

        Self {
            optional_services,
            priority_services,
            fast_path_characteristics: vec![
                PRINTER_18F0_WRITE,
                VENDOR_PRINT_WRITE,
                ISSC_UART_WRITE,
                HM10_UART_DATA,
                FF00_WRITE,
                AE30_WRITE,
                NORDIC_UART_RX,
            ],
        }
    }
}
