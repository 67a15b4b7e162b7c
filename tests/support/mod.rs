pub mod mock_card;
